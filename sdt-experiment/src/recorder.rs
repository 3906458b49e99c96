use sdt_core::ResponseRecord;

/// Append-only record table, in presentation order.
#[derive(Debug, Default)]
pub struct DataRecorder {
    records: Vec<ResponseRecord>,
}

impl DataRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, record: ResponseRecord) {
        self.records.push(record);
    }

    pub fn snapshot(&self) -> &[ResponseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdt_core::NO_RESPONSE_RT_MS;

    fn record(position: usize, pressed: bool) -> ResponseRecord {
        ResponseRecord {
            block: 0,
            position,
            word: format!("w{position}"),
            track: 0,
            list: 0,
            pressed,
            reaction_time_ms: if pressed { 412.0 } else { NO_RESPONSE_RT_MS },
        }
    }

    #[test]
    fn keeps_order_and_duplicates() {
        let mut rec = DataRecorder::new();
        rec.append(record(2, true));
        rec.append(record(1, false));
        rec.append(record(1, false));
        let positions: Vec<_> = rec.snapshot().iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![2, 1, 1]);
    }

    #[test]
    fn snapshot_is_repeatable() {
        let mut rec = DataRecorder::with_capacity(4);
        rec.append(record(1, true));
        assert_eq!(rec.snapshot(), rec.snapshot());
        assert_eq!(rec.len(), 1);
    }
}
