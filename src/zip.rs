//! Alignment of per-channel readings into multi-channel rows.
//!
//! Readings of one channel group that share a timestamp form a batch. A
//! batch is flushed as soon as a reading with a different timestamp arrives,
//! and again when the input ends. Each flush expands into one row per sample
//! position, with `NaN` for every channel missing from the batch.
//!
//! The transport must deliver a batch's readings contiguously; interleaving
//! two batches splits them into several partial batches.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use log::{debug, warn};

use crate::protocol::{
    EEG_CHANNEL_COUNT, EEG_FREQUENCY, EEG_SAMPLES_PER_READING, PPG_CHANNEL_COUNT, PPG_FREQUENCY,
    PPG_SAMPLES_PER_READING,
};
use crate::types::{AlignedRow, ChannelReading, EegReading, EegSample, PpgReading, PpgSample};

/// Groups readings by timestamp and expands each group into aligned rows.
///
/// ```
/// # use muse_decode::types::EegReading;
/// # use muse_decode::zip::SampleZipper;
/// let mut zipper = SampleZipper::<5>::new(2, 256.0);
/// let reading = |electrode, v: f64| EegReading {
///     index: 1, electrode, timestamp: 500.0, samples: vec![v, v + 0.5],
/// };
/// assert!(zipper.push(reading(0, 1.0)).is_empty());
/// assert!(zipper.push(reading(3, 4.0)).is_empty());
/// let rows = zipper.finish();
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[1].timestamp, 500.0 + 1000.0 / 256.0);
/// assert_eq!(rows[1].data[3], 4.5);
/// assert!(rows[1].data[1].is_nan());
/// ```
#[derive(Debug)]
pub struct SampleZipper<const N: usize, R = EegReading> {
    samples_per_reading: usize,
    frequency: f64,
    buffer: Vec<R>,
    last_timestamp: Option<f64>,
}

impl<const N: usize, R: ChannelReading> SampleZipper<N, R> {
    pub fn new(samples_per_reading: usize, frequency: f64) -> Self {
        Self {
            samples_per_reading,
            frequency,
            buffer: Vec::with_capacity(N),
            last_timestamp: None,
        }
    }

    /// Readings buffered towards the current batch.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one reading; returns the rows of the batch it closed, if any.
    pub fn push(&mut self, reading: R) -> Vec<AlignedRow<N>> {
        if reading.channel() >= N {
            warn!(
                "dropping reading for channel {} (group has {N} channels)",
                reading.channel()
            );
            return Vec::new();
        }

        let timestamp = reading.timestamp();
        let changed = self.last_timestamp != Some(timestamp);
        self.last_timestamp = Some(timestamp);

        if changed && !self.buffer.is_empty() {
            let rows = self.flush();
            self.buffer.push(reading);
            return rows;
        }
        self.buffer.push(reading);
        Vec::new()
    }

    /// Flush whatever is buffered; call once the input has ended.
    pub fn finish(&mut self) -> Vec<AlignedRow<N>> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        self.flush()
    }

    /// Drop the buffered batch without emitting it.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last_timestamp = None;
    }

    fn flush(&mut self) -> Vec<AlignedRow<N>> {
        let batch = std::mem::take(&mut self.buffer);
        let Some(first) = batch.first() else {
            return Vec::new();
        };
        let index = first.index();
        let timestamp = first.timestamp();

        let mut slots: [Option<&R>; N] = [None; N];
        for reading in &batch {
            let slot = &mut slots[reading.channel()];
            if slot.is_some() {
                debug!("channel {} repeated in batch {index}", reading.channel());
            }
            *slot = Some(reading);
        }

        (0..self.samples_per_reading)
            .map(|i| AlignedRow {
                index,
                timestamp: timestamp + i as f64 * 1000.0 / self.frequency,
                data: std::array::from_fn(|c| {
                    slots[c]
                        .and_then(|r| r.samples().get(i).copied())
                        .unwrap_or(f64::NAN)
                }),
            })
            .collect()
    }
}

impl SampleZipper<EEG_CHANNEL_COUNT, EegReading> {
    /// Zipper for the five EEG electrodes.
    pub fn eeg() -> Self {
        Self::new(EEG_SAMPLES_PER_READING, EEG_FREQUENCY)
    }
}

impl SampleZipper<PPG_CHANNEL_COUNT, PpgReading> {
    /// Zipper for the three optical channels.
    pub fn ppg() -> Self {
        Self::new(PPG_SAMPLES_PER_READING, PPG_FREQUENCY)
    }
}

/// Zip a complete sequence of readings with `zipper`, flushing at the end.
pub fn zip_with<const N: usize, R, I>(
    mut zipper: SampleZipper<N, R>,
    readings: I,
) -> Vec<AlignedRow<N>>
where
    R: ChannelReading,
    I: IntoIterator<Item = R>,
{
    let mut rows = Vec::new();
    for reading in readings {
        rows.extend(zipper.push(reading));
    }
    rows.extend(zipper.finish());
    rows
}

/// Zip EEG readings into `[TP9, AF7, AF8, TP10, AUX]` rows.
pub fn zip_samples<I>(readings: I) -> Vec<EegSample>
where
    I: IntoIterator<Item = EegReading>,
{
    zip_with(SampleZipper::eeg(), readings)
}

/// Zip PPG readings into `[ambient, infrared, red]` rows.
pub fn zip_samples_ppg<I>(readings: I) -> Vec<PpgSample>
where
    I: IntoIterator<Item = PpgReading>,
{
    zip_with(SampleZipper::ppg(), readings)
}

struct ZipState<S, const N: usize, R> {
    readings: Pin<Box<S>>,
    zipper: SampleZipper<N, R>,
    ready: VecDeque<AlignedRow<N>>,
    done: bool,
}

/// Adapt a stream of readings into a stream of aligned rows.
///
/// Rows of a batch are yielded once the batch is closed by a newer
/// timestamp; the last batch is yielded when `readings` ends.
pub fn zip_stream<const N: usize, R, S>(
    readings: S,
    zipper: SampleZipper<N, R>,
) -> impl Stream<Item = AlignedRow<N>>
where
    R: ChannelReading,
    S: Stream<Item = R>,
{
    let state = ZipState {
        readings: Box::pin(readings),
        zipper,
        ready: VecDeque::new(),
        done: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(row) = state.ready.pop_front() {
                return Some((row, state));
            }
            if state.done {
                return None;
            }
            match state.readings.next().await {
                Some(reading) => state.ready.extend(state.zipper.push(reading)),
                None => {
                    state.ready.extend(state.zipper.finish());
                    state.done = true;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eeg(electrode: usize, index: u16, timestamp: f64, base: f64, n: usize) -> EegReading {
        EegReading {
            index,
            electrode,
            timestamp,
            samples: (1..=n).map(|i| base + i as f64 / 100.0).collect(),
        }
    }

    fn ppg(ppg_channel: usize, index: u16, timestamp: f64, base: f64, n: usize) -> PpgReading {
        PpgReading {
            index,
            ppg_channel,
            timestamp,
            samples: (1..=n).map(|i| base + i as f64 / 100.0).collect(),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn zips_all_eeg_channels() {
        let mut input = Vec::new();
        for (index, ts, offset) in [(100u16, 1000.0, 0.0), (101, 1046.875, 10.0)] {
            for electrode in [2, 1, 4, 0, 3] {
                input.push(eeg(electrode, index, ts, offset + electrode as f64, 12));
            }
        }
        let rows = zip_samples(input);
        assert_eq!(rows.len(), 24);

        assert_eq!(rows[0].index, 100);
        assert_eq!(rows[0].timestamp, 1000.0);
        assert!(close(rows[0].data[0], 0.01));
        assert!(close(rows[0].data[4], 4.01));
        assert_eq!(rows[1].timestamp, 1003.90625);
        assert_eq!(rows[11].timestamp, 1042.96875);
        assert!(close(rows[11].data[2], 2.12));

        assert_eq!(rows[12].index, 101);
        assert_eq!(rows[12].timestamp, 1046.875);
        assert!(close(rows[12].data[0], 10.01));
        assert!(close(rows[23].data[3], 13.12));
        assert_eq!(rows[23].timestamp, 1089.84375);
        assert!(rows.iter().all(|r| r.data.iter().all(|v| !v.is_nan())));
    }

    #[test]
    fn missing_channel_is_nan() {
        let input: Vec<_> = [2, 4, 0, 3]
            .into_iter()
            .map(|e| eeg(e, 50, 5000.0, e as f64, 12))
            .collect();
        let rows = zip_samples(input);
        assert_eq!(rows.len(), 12);
        for (i, row) in rows.iter().enumerate() {
            assert!(row.data[1].is_nan());
            for c in [0, 2, 3, 4] {
                assert!(close(row.data[c], c as f64 + (i + 1) as f64 / 100.0));
            }
        }
    }

    #[test]
    fn short_reading_pads_with_nan() {
        let mut zipper = SampleZipper::<5>::new(4, 256.0);
        zipper.push(eeg(0, 1, 0.0, 0.0, 4));
        zipper.push(eeg(1, 1, 0.0, 1.0, 2));
        let rows = zipper.finish();
        assert_eq!(rows.len(), 4);
        assert!(close(rows[1].data[1], 1.02));
        assert!(rows[2].data[1].is_nan());
        assert!(close(rows[3].data[0], 0.04));
    }

    #[test]
    fn batches_flush_on_timestamp_change() {
        let mut zipper = SampleZipper::eeg();
        assert!(zipper.push(eeg(0, 1, 10.0, 0.0, 12)).is_empty());
        assert!(zipper.push(eeg(1, 1, 10.0, 1.0, 12)).is_empty());
        assert_eq!(zipper.pending(), 2);
        let rows = zipper.push(eeg(0, 2, 56.875, 5.0, 12));
        assert_eq!(rows.len(), 12);
        assert!(rows.iter().all(|r| r.index == 1 && r.data[2].is_nan()));
        assert_eq!(zipper.pending(), 1);
        let tail = zipper.finish();
        assert_eq!(tail.len(), 12);
        assert_eq!(tail[0].timestamp, 56.875);
        assert!(zipper.finish().is_empty());
    }

    #[test]
    fn out_of_range_channel_is_dropped() {
        let mut zipper = SampleZipper::ppg();
        assert!(zipper.push(ppg(3, 1, 0.0, 0.0, 6)).is_empty());
        assert_eq!(zipper.pending(), 0);
        assert!(zipper.finish().is_empty());
    }

    #[test]
    fn repeated_channel_keeps_latest() {
        let rows = zip_samples(vec![eeg(0, 1, 0.0, 0.0, 12), eeg(0, 1, 0.0, 7.0, 12)]);
        assert_eq!(rows.len(), 12);
        assert!(close(rows[0].data[0], 7.01));
    }

    #[test]
    fn zips_ppg_channels_at_64_hz() {
        let mut input = Vec::new();
        for (index, ts, offset) in [(100u16, 1000.0, 0.0), (101, 1093.75, 10.0)] {
            for ch in 0..3 {
                input.push(ppg(ch, index, ts, offset + ch as f64, 6));
            }
        }
        let rows = zip_samples_ppg(input);
        assert_eq!(rows.len(), 12);
        let stamps: Vec<f64> = rows[..6].iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![1000.0, 1015.625, 1031.25, 1046.875, 1062.5, 1078.125]);
        assert!(close(rows[0].data[1], 1.01));
        assert_eq!(rows[6].index, 101);
        assert_eq!(rows[11].timestamp, 1093.75 + 5.0 * 15.625);
        assert!(close(rows[11].data[2], 12.06));
    }

    #[test]
    fn ppg_missing_channel_is_nan() {
        let rows = zip_samples_ppg(vec![
            ppg(0, 50, 5000.0, 0.0, 6),
            ppg(2, 50, 5000.0, 2.0, 6),
        ]);
        assert_eq!(rows.len(), 6);
        assert!(rows.iter().all(|r| r.data[1].is_nan()));
        assert!(close(rows[3].data[2], 2.04));
    }

    #[test]
    fn empty_input_produces_nothing() {
        assert!(zip_samples(Vec::new()).is_empty());
    }

    #[test]
    fn stream_matches_batch_zipping() {
        let input: Vec<_> = (0..4u16)
            .flat_map(|i| {
                let ts = 100.0 + f64::from(i) * 46.875;
                (0..5).map(move |e| eeg(e, i, ts, e as f64, 12))
            })
            .collect();
        let expected = zip_samples(input.clone());
        let rows: Vec<_> = futures::executor::block_on(
            zip_stream(stream::iter(input), SampleZipper::eeg()).collect(),
        );
        assert_eq!(rows, expected);
        assert_eq!(rows.len(), 48);
    }
}
