//! Command sequence and the playback cursor that walks it.

use crate::domain::models::HapticCommand;
use thiserror::Error;
use tracing::debug;

pub const MAX_POSITION: u8 = 100;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("command {index} at {time} ms comes before the previous one at {previous} ms")]
    OutOfOrder {
        index: usize,
        previous: u64,
        time: u64,
    },
    #[error("command {index} has position {position}, expected 0..=100")]
    PositionOutOfRange { index: usize, position: u8 },
}

/// Immutable, time-ordered haptic script.
///
/// Commands sharing a timestamp collapse to the last one given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSequence {
    commands: Vec<HapticCommand>,
}

impl CommandSequence {
    pub fn new(commands: Vec<HapticCommand>) -> Result<Self, SequenceError> {
        let mut collapsed: Vec<HapticCommand> = Vec::with_capacity(commands.len());

        for (index, command) in commands.into_iter().enumerate() {
            if command.position > MAX_POSITION {
                return Err(SequenceError::PositionOutOfRange {
                    index,
                    position: command.position,
                });
            }
            if let Some(last) = collapsed.last() {
                if command.time < last.time {
                    return Err(SequenceError::OutOfOrder {
                        index,
                        previous: last.time,
                        time: command.time,
                    });
                }
            }
            push_collapsing(&mut collapsed, command);
        }

        Ok(Self {
            commands: collapsed,
        })
    }

    pub fn from_pairs(pairs: &[(u64, u8)]) -> Result<Self, SequenceError> {
        Self::new(
            pairs
                .iter()
                .map(|&(time, position)| HapticCommand::new(time, position))
                .collect(),
        )
    }

    /// Flat script used when media loads without any haptics.
    pub fn placeholder(duration_ms: u64) -> Self {
        let mut commands = Vec::with_capacity(2);
        push_collapsing(&mut commands, HapticCommand::new(0, 0));
        push_collapsing(&mut commands, HapticCommand::new(duration_ms, 0));
        Self { commands }
    }

    pub fn commands(&self) -> &[HapticCommand] {
        &self.commands
    }

    pub fn get(&self, index: usize) -> Option<&HapticCommand> {
        self.commands.get(index)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Greatest index whose time is `<= time`, by bisection.
    pub fn index_at(&self, time: i64) -> Option<usize> {
        if time < 0 {
            return None;
        }
        let reached = self
            .commands
            .partition_point(|command| command.time <= time as u64);
        reached.checked_sub(1)
    }
}

/// Append `command`, replacing the last entry when the timestamps match.
fn push_collapsing(commands: &mut Vec<HapticCommand>, command: HapticCommand) {
    if let Some(last) = commands.last_mut() {
        if last.time == command.time {
            *last = command;
            return;
        }
    }
    commands.push(command);
}

/// Tracks the last command reached for a monotonic-but-seekable timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackCursor {
    last_index: Option<usize>,
    last_time_checked: i64,
    paused: bool,
}

impl Default for PlaybackCursor {
    fn default() -> Self {
        Self {
            last_index: None,
            last_time_checked: 0,
            paused: true,
        }
    }
}

impl PlaybackCursor {
    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    pub fn last_time_checked(&self) -> i64 {
        self.last_time_checked
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns whether the flag changed.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        let changed = self.paused != paused;
        self.paused = paused;
        changed
    }

    pub fn reset(&mut self) {
        self.last_index = None;
        self.last_time_checked = 0;
    }

    /// Move to the last command at or before `offset_time`.
    ///
    /// A sample earlier than the previous one is a backward seek: the cursor
    /// restarts from the beginning. Otherwise it only moves forward.
    pub fn advance(&mut self, sequence: &CommandSequence, offset_time: i64) -> Option<usize> {
        if offset_time < self.last_time_checked {
            debug!(
                "Backward seek {} -> {} ms, resetting cursor",
                self.last_time_checked, offset_time
            );
            self.last_index = sequence.index_at(offset_time);
        }
        self.last_time_checked = offset_time;

        let mut next = self.last_index.map_or(0, |i| i + 1);
        while let Some(command) = sequence.get(next) {
            if offset_time < 0 || command.time > offset_time as u64 {
                break;
            }
            self.last_index = Some(next);
            next += 1;
        }
        self.last_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_collapse_to_later() {
        let sequence = CommandSequence::from_pairs(&[(0, 10), (500, 20), (500, 80), (900, 0)])
            .unwrap();
        assert_eq!(sequence.len(), 3);
        assert_eq!(sequence.get(1), Some(&HapticCommand::new(500, 80)));
    }

    #[test]
    fn test_out_of_order_rejected() {
        let err = CommandSequence::from_pairs(&[(0, 10), (500, 20), (400, 0)]).unwrap_err();
        assert_eq!(
            err,
            SequenceError::OutOfOrder {
                index: 2,
                previous: 500,
                time: 400
            }
        );
    }

    #[test]
    fn test_position_range_checked() {
        let err = CommandSequence::from_pairs(&[(0, 101)]).unwrap_err();
        assert_eq!(
            err,
            SequenceError::PositionOutOfRange {
                index: 0,
                position: 101
            }
        );
    }

    #[test]
    fn test_index_at() {
        let sequence = CommandSequence::from_pairs(&[(0, 0), (1000, 50), (2000, 100)]).unwrap();
        assert_eq!(sequence.index_at(-5), None);
        assert_eq!(sequence.index_at(0), Some(0));
        assert_eq!(sequence.index_at(999), Some(0));
        assert_eq!(sequence.index_at(1000), Some(1));
        assert_eq!(sequence.index_at(5000), Some(2));

        let late = CommandSequence::from_pairs(&[(300, 0)]).unwrap();
        assert_eq!(late.index_at(100), None);
    }

    #[test]
    fn test_cursor_is_monotonic() {
        let sequence = CommandSequence::from_pairs(&[(0, 0), (1000, 50), (2000, 100)]).unwrap();
        let mut cursor = PlaybackCursor::default();

        let mut previous = None;
        for (time, expected) in [
            (0, Some(0)),
            (500, Some(0)),
            (1000, Some(1)),
            (1500, Some(1)),
            (2000, Some(2)),
            (2500, Some(2)),
        ] {
            let index = cursor.advance(&sequence, time);
            assert_eq!(index, expected, "at {} ms", time);
            assert!(index >= previous);
            previous = index;
        }
    }

    #[test]
    fn test_backward_seek_resets() {
        let sequence = CommandSequence::from_pairs(&[(0, 0), (1000, 50), (2000, 100)]).unwrap();
        let mut cursor = PlaybackCursor::default();
        assert_eq!(cursor.advance(&sequence, 2500), Some(2));

        assert_eq!(cursor.advance(&sequence, 200), Some(0));
        assert_eq!(cursor.last_time_checked(), 200);

        // A seek to before the first command leaves nothing reached.
        let late = CommandSequence::from_pairs(&[(300, 0), (600, 10)]).unwrap();
        let mut cursor = PlaybackCursor::default();
        assert_eq!(cursor.advance(&late, 700), Some(1));
        assert_eq!(cursor.advance(&late, 100), None);
    }

    #[test]
    fn test_large_forward_jump_scans_ahead() {
        let sequence =
            CommandSequence::from_pairs(&[(0, 0), (10, 1), (20, 2), (30, 3), (40, 4)]).unwrap();
        let mut cursor = PlaybackCursor::default();
        assert_eq!(cursor.advance(&sequence, 5), Some(0));
        assert_eq!(cursor.advance(&sequence, 35), Some(3));
    }

    #[test]
    fn test_negative_offset_reaches_nothing() {
        let sequence = CommandSequence::from_pairs(&[(0, 0), (1000, 50)]).unwrap();
        let mut cursor = PlaybackCursor::default();
        assert_eq!(cursor.advance(&sequence, -200), None);
        assert_eq!(cursor.advance(&sequence, 0), Some(0));
    }

    #[test]
    fn test_pause_flag_reports_changes() {
        let mut cursor = PlaybackCursor::default();
        assert!(cursor.is_paused());
        assert!(!cursor.set_paused(true));
        assert!(cursor.set_paused(false));
        assert!(!cursor.is_paused());
    }

    #[test]
    fn test_placeholder() {
        let sequence = CommandSequence::placeholder(60_000);
        assert_eq!(
            sequence.commands(),
            &[HapticCommand::new(0, 0), HapticCommand::new(60_000, 0)]
        );

        let instant = CommandSequence::placeholder(0);
        assert_eq!(instant.commands(), &[HapticCommand::new(0, 0)]);
    }
}
