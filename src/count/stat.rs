use crate::ffi::{bindings as b, Cursor};

/// Value of one counter, shaped by the event's
/// [`CountFormat`][crate::config::CountFormat].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Count {
    /// Label of the event the value was read from.
    pub label: String,
    pub value: u64,
    pub time_enabled: Option<u64>,
    pub time_running: Option<u64>,
    pub id: Option<u64>,
    pub lost: Option<u64>,
}

impl Count {
    /// Value scaled up to compensate for multiplexing.
    ///
    /// Needs both times in the count format, returns the raw value otherwise.
    pub fn scaled(&self) -> u64 {
        match (self.time_enabled, self.time_running) {
            (Some(enabled), Some(running)) if running > 0 && running < enabled => {
                (self.value as u128 * enabled as u128 / running as u128) as u64
            }
            _ => self.value,
        }
    }
}

/// Values of every member of a group, in the order the members were opened.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupCount {
    pub time_enabled: Option<u64>,
    pub time_running: Option<u64>,
    pub values: Vec<Count>,
}

impl GroupCount {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Count> {
        self.values.iter()
    }

    /// First value carrying `label`.
    pub fn get(&self, label: &str) -> Option<&Count> {
        self.values.iter().find(|it| it.label == label)
    }
}

impl<'a> IntoIterator for &'a GroupCount {
    type Item = &'a Count;
    type IntoIter = std::slice::Iter<'a, Count>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L344
// struct read_format {
//     {
//         u64 value;
//         { u64 time_enabled; } && PERF_FORMAT_TOTAL_TIME_ENABLED
//         { u64 time_running; } && PERF_FORMAT_TOTAL_TIME_RUNNING
//         { u64 id;           } && PERF_FORMAT_ID
//         { u64 lost;         } && PERF_FORMAT_LOST
//     } && !PERF_FORMAT_GROUP
//     {
//         u64 nr;
//         { u64 time_enabled; } && PERF_FORMAT_TOTAL_TIME_ENABLED
//         { u64 time_running; } && PERF_FORMAT_TOTAL_TIME_RUNNING
//         {
//             u64 value;
//             { u64 id;   } && PERF_FORMAT_ID
//             { u64 lost; } && PERF_FORMAT_LOST
//         } cntr[nr];
//     } && PERF_FORMAT_GROUP
// };
macro_rules! when {
    ($c:expr, $read_format:expr, $flag:ident) => {
        if $read_format & b::$flag as u64 > 0 {
            Some($c.read::<u64>()?)
        } else {
            None
        }
    };
}

pub(crate) fn parse_count(c: &mut Cursor<'_>, read_format: u64) -> Option<Count> {
    Some(Count {
        label: String::new(),
        value: c.read()?,
        time_enabled: when!(c, read_format, PERF_FORMAT_TOTAL_TIME_ENABLED),
        time_running: when!(c, read_format, PERF_FORMAT_TOTAL_TIME_RUNNING),
        id: when!(c, read_format, PERF_FORMAT_ID),
        lost: when!(c, read_format, PERF_FORMAT_LOST),
    })
}

pub(crate) fn parse_group(c: &mut Cursor<'_>, read_format: u64) -> Option<GroupCount> {
    let nr: u64 = c.read()?;
    let time_enabled = when!(c, read_format, PERF_FORMAT_TOTAL_TIME_ENABLED);
    let time_running = when!(c, read_format, PERF_FORMAT_TOTAL_TIME_RUNNING);

    // Each entry takes at least one word, reject counts the buffer can not hold.
    if nr > (c.remaining() / 8) as u64 {
        return None;
    }
    let values = (0..nr)
        .map(|_| {
            Some(Count {
                label: String::new(),
                value: c.read()?,
                time_enabled,
                time_running,
                id: when!(c, read_format, PERF_FORMAT_ID),
                lost: when!(c, read_format, PERF_FORMAT_LOST),
            })
        })
        .collect::<Option<_>>()?;

    Some(GroupCount {
        time_enabled,
        time_running,
        values,
    })
}

/// Size of a `read(2)` on an event with `members` counters.
pub(crate) fn read_size(read_format: u64, members: usize) -> usize {
    let has = |flag: u32| (read_format & flag as u64 > 0) as usize;
    let times = has(b::PERF_FORMAT_TOTAL_TIME_ENABLED) + has(b::PERF_FORMAT_TOTAL_TIME_RUNNING);
    let per_value = 1 + has(b::PERF_FORMAT_ID) + has(b::PERF_FORMAT_LOST);

    let words = if read_format & b::PERF_FORMAT_GROUP as u64 > 0 {
        1 + times + per_value * members
    } else {
        times + per_value
    };
    words * 8
}
