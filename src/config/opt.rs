/// Boolean options of an event.
///
/// Each option is a single bit in one of two option words: word 0 is the
/// 64-bit flag word of `perf_event_attr`, word 1 is the `aux_action` word.
/// Positions come from [`Opt::position`] and are fixed by the kernel ABI.
///
/// `freq`, `watermark`, `use_clockid` and `precise_ip` also live in word 0,
/// they are derived from [`Attr`][super::Attr] setters instead of being set directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Opt {
    /// Start disabled, an `enable` is needed to start counting.
    Disabled,
    /// Children created after open inherit the event.
    Inherit,
    /// Always keep the event on the PMU, or put it in error state.
    Pinned,
    /// Only this group may be on the PMU while it is scheduled.
    Exclusive,
    ExcludeUser,
    ExcludeKernel,
    ExcludeHv,
    ExcludeIdle,
    /// Emit `Mmap` records for executable mappings.
    Mmap,
    /// Emit `Comm` records.
    Comm,
    /// Per-task counts on inherited events.
    InheritStat,
    /// Enable on the next `exec`.
    EnableOnExec,
    /// Emit `Fork` and `Exit` records.
    Task,
    /// Emit `Mmap` records for non-executable mappings.
    MmapData,
    /// Append the sample-id trailer to every non-sample record.
    SampleIdAll,
    ExcludeHost,
    ExcludeGuest,
    ExcludeCallchainKernel,
    ExcludeCallchainUser,
    /// Emit the extended `Mmap` layout.
    Mmap2,
    /// Flag `Comm` records caused by `exec`.
    CommExec,
    /// Emit `Switch` records.
    ContextSwitch,
    /// Write the ring from its end.
    WriteBackward,
    /// Emit `Namespaces` records.
    Namespaces,
    Ksymbol,
    BpfEvent,
    AuxOutput,
    Cgroup,
    TextPoke,
    /// Report build ids instead of inode info in `Mmap` records.
    BuildId,
    /// Only threads inherit, requires [`Inherit`][Self::Inherit].
    InheritThread,
    RemoveOnExec,
    /// Send `SIGTRAP` on overflow, requires [`RemoveOnExec`][Self::RemoveOnExec].
    Sigtrap,
    /// Start the AUX area paused.
    AuxStartPaused,
    /// Pause AUX tracing on overflow.
    AuxPause,
    /// Resume AUX tracing on overflow.
    AuxResume,
}

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L402
pub(crate) const FREQ: (usize, u32) = (0, 10);
pub(crate) const WATERMARK: (usize, u32) = (0, 14);
pub(crate) const PRECISE_IP: (usize, u32) = (0, 15); // 2 bits
pub(crate) const USE_CLOCKID: (usize, u32) = (0, 25);

impl Opt {
    pub const ALL: [Opt; 36] = [
        Opt::Disabled,
        Opt::Inherit,
        Opt::Pinned,
        Opt::Exclusive,
        Opt::ExcludeUser,
        Opt::ExcludeKernel,
        Opt::ExcludeHv,
        Opt::ExcludeIdle,
        Opt::Mmap,
        Opt::Comm,
        Opt::InheritStat,
        Opt::EnableOnExec,
        Opt::Task,
        Opt::MmapData,
        Opt::SampleIdAll,
        Opt::ExcludeHost,
        Opt::ExcludeGuest,
        Opt::ExcludeCallchainKernel,
        Opt::ExcludeCallchainUser,
        Opt::Mmap2,
        Opt::CommExec,
        Opt::ContextSwitch,
        Opt::WriteBackward,
        Opt::Namespaces,
        Opt::Ksymbol,
        Opt::BpfEvent,
        Opt::AuxOutput,
        Opt::Cgroup,
        Opt::TextPoke,
        Opt::BuildId,
        Opt::InheritThread,
        Opt::RemoveOnExec,
        Opt::Sigtrap,
        Opt::AuxStartPaused,
        Opt::AuxPause,
        Opt::AuxResume,
    ];

    /// Returns `(word, bit)` of this option.
    pub const fn position(self) -> (usize, u32) {
        match self {
            Opt::Disabled => (0, 0),
            Opt::Inherit => (0, 1),
            Opt::Pinned => (0, 2),
            Opt::Exclusive => (0, 3),
            Opt::ExcludeUser => (0, 4),
            Opt::ExcludeKernel => (0, 5),
            Opt::ExcludeHv => (0, 6),
            Opt::ExcludeIdle => (0, 7),
            Opt::Mmap => (0, 8),
            Opt::Comm => (0, 9),
            // 10: freq
            Opt::InheritStat => (0, 11),
            Opt::EnableOnExec => (0, 12),
            Opt::Task => (0, 13),
            // 14: watermark, 15-16: precise_ip
            Opt::MmapData => (0, 17),
            Opt::SampleIdAll => (0, 18),
            Opt::ExcludeHost => (0, 19),
            Opt::ExcludeGuest => (0, 20),
            Opt::ExcludeCallchainKernel => (0, 21),
            Opt::ExcludeCallchainUser => (0, 22),
            Opt::Mmap2 => (0, 23),
            Opt::CommExec => (0, 24),
            // 25: use_clockid
            Opt::ContextSwitch => (0, 26),
            Opt::WriteBackward => (0, 27),
            Opt::Namespaces => (0, 28),
            Opt::Ksymbol => (0, 29),
            Opt::BpfEvent => (0, 30),
            Opt::AuxOutput => (0, 31),
            Opt::Cgroup => (0, 32),
            Opt::TextPoke => (0, 33),
            Opt::BuildId => (0, 34),
            Opt::InheritThread => (0, 35),
            Opt::RemoveOnExec => (0, 36),
            Opt::Sigtrap => (0, 37),
            Opt::AuxStartPaused => (1, 0),
            Opt::AuxPause => (1, 1),
            Opt::AuxResume => (1, 2),
        }
    }
}

/// The two option words.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Options {
    words: [u64; 2],
}

impl Options {
    pub fn set(&mut self, opt: Opt, on: bool) {
        let (word, bit) = opt.position();
        self.put((word, bit), on);
    }

    pub fn get(&self, opt: Opt) -> bool {
        self.bit(opt.position())
    }

    /// Builder form of [`set`][Self::set].
    pub fn with(mut self, opt: Opt) -> Self {
        self.set(opt, true);
        self
    }

    pub(crate) fn put(&mut self, (word, bit): (usize, u32), on: bool) {
        if on {
            self.words[word] |= 1 << bit;
        } else {
            self.words[word] &= !(1 << bit);
        }
    }

    pub(crate) fn bit(&self, (word, bit): (usize, u32)) -> bool {
        self.words[word] & (1 << bit) != 0
    }

    pub(crate) fn word(&self, word: usize) -> u64 {
        self.words[word]
    }

    pub(crate) fn set_field(&mut self, (word, shift): (usize, u32), width: u32, val: u64) {
        let mask = ((1 << width) - 1) << shift;
        self.words[word] = (self.words[word] & !mask) | ((val << shift) & mask);
    }
}

impl FromIterator<Opt> for Options {
    fn from_iter<T: IntoIterator<Item = Opt>>(iter: T) -> Self {
        iter.into_iter().fold(Self::default(), Options::with)
    }
}
