use tracing::info;

/// Starts and stops the background track of a block.
pub trait TrackCue {
    fn start(&mut self, track: usize, name: &str) -> anyhow::Result<()>;
    fn stop(&mut self) -> anyhow::Result<()>;
}

/// Logs cues instead of playing audio.
#[derive(Debug, Default)]
pub struct LoggedCue {
    playing: Option<usize>,
}

impl TrackCue for LoggedCue {
    fn start(&mut self, track: usize, name: &str) -> anyhow::Result<()> {
        info!(track, name, "background track started");
        self.playing = Some(track);
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        if let Some(track) = self.playing.take() {
            info!(track, "background track stopped");
        }
        Ok(())
    }
}

/// Remembers every cue, for assertions.
#[derive(Debug, Default)]
pub struct CueLog {
    pub started: Vec<usize>,
    pub stops: usize,
}

impl TrackCue for CueLog {
    fn start(&mut self, track: usize, _name: &str) -> anyhow::Result<()> {
        self.started.push(track);
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        self.stops += 1;
        Ok(())
    }
}
