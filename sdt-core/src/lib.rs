pub mod input;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use input::{Key, KeySet};
pub use phase::SessionPhase;
pub use stimulus::{Stimulus, TextRole};
pub use trial::{CapturedResponse, NO_RESPONSE_RT_MS, ResponseRecord};
