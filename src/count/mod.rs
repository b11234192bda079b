//! Event handles and counts.

use std::ffi::CString;
use std::fmt::Display;
use std::fs::File;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use group::{lock, Group};

use crate::config::{Attr, Cpu, Opt, Sampling, Target};
use crate::error::{retry, Error, Origin, Result};
use crate::ffi::syscall::{gettid, ioctl_arg, ioctl_argp, perf_event_open, read};
use crate::ffi::{bindings as b, Cursor};
use crate::sample::record::{Parser, Record};
use crate::sample::{Decoder, ReadCtx, RecordStream, Records, Registry, Ring, DEFAULT_EXP};

pub(crate) mod group;
pub(crate) mod stat;

pub use stat::{Count, GroupCount};


/// Lifecycle state of an [`Event`].
///
/// Closing consumes the event, so there is no closed state to observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum State {
    /// Opened, not enabled or disabled through this handle yet.
    Open,
    Enabled,
    Disabled,
    /// A fatal error left the kernel state unknown, only dropping or
    /// [closing][Event::close] is accepted.
    Poisoned,
}

impl State {
    pub(crate) fn load(cell: &AtomicU8) -> Self {
        match cell.load(Ordering::Acquire) {
            0 => Self::Open,
            1 => Self::Enabled,
            2 => Self::Disabled,
            _ => Self::Poisoned,
        }
    }

    /// Stores `to` unless the cell is poisoned.
    pub(crate) fn transition(cell: &AtomicU8, to: Self) {
        let poisoned = Self::Poisoned as u8;
        let _ = cell.fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
            (cur != poisoned).then_some(to as u8)
        });
    }
}

/// An opened perf event.
///
/// Events opened with `leader = None` lead their own group, events opened
/// with a leader join the leader's group and borrow it for as long as they
/// live. Enabling, disabling and resetting a leader applies to the whole
/// group at once.
///
/// Events opened for [`Target::CallingThread`] count the thread that opened
/// them. Their ioctls should be issued from that same thread (see
/// [`ThreadPin`][crate::config::ThreadPin]). This is logged, not enforced.
///
/// # Examples
///
/// ```rust,no_run
/// use perf_event_ring::config::{Attr, Cpu, Target};
/// use perf_event_ring::count::Event;
/// use perf_event_ring::event::{hw::Hardware, Configure};
///
/// let mut attr = Attr::default();
/// Hardware::Instr.configure(&mut attr).unwrap();
/// attr.label = "instructions".to_string();
///
/// let event = Event::open(&attr, Target::CallingThread, Cpu::Any, None).unwrap();
/// let count = event
///     .measure(|| {
///         std::hint::black_box((0..1000).sum::<u64>());
///     })
///     .unwrap();
/// println!("{}: {}", count.label, count.value);
/// ```
#[derive(Debug)]
pub struct Event<'g> {
    attr: Mutex<Attr>,
    perf: Arc<File>,
    leader: Option<&'g Event<'g>>,
    group: Arc<Group>,
    key: u64,
    state: Arc<AtomicU8>,
    parser: Parser,
    ring: OnceLock<Ring>,
    redirect: Mutex<Option<(Arc<Registry>, u64)>>,
    owner: Option<i32>,
}

impl<'g> Event<'g> {
    /// Opens an event, joining `leader`'s group if given.
    ///
    /// The attribute is validated first, so an inconsistent one never reaches the kernel.
    pub fn open(
        attr: &Attr,
        target: Target,
        cpu: Cpu,
        leader: Option<&'g Event<'g>>,
    ) -> Result<Self> {
        attr.validate()?;
        let args = target.resolve(cpu)?;
        let group_fd = match leader {
            Some(leader) => {
                leader.check()?;
                leader.perf.as_raw_fd()
            }
            None => -1,
        };

        let bytes = attr.encode();
        let flags = args.flags | b::PERF_FLAG_FD_CLOEXEC;
        let perf = retry(|| perf_event_open(bytes.as_bytes(), args.pid, args.cpu, group_fd, flags))
            .map_err(|e| Error::os(e, Origin::Open))?;
        log::debug!(
            "opened {:?} type {} config {:#x} pid {} cpu {} fd {}",
            attr.label,
            attr.ty,
            attr.config,
            args.pid,
            args.cpu,
            perf.as_raw_fd(),
        );

        let state = Arc::new(AtomicU8::new(State::Open as u8));
        let group = match leader {
            Some(leader) => leader.group.clone(),
            None => Group::new(),
        };
        let key = group.join(attr.label.clone(), state.clone());

        Ok(Self {
            attr: Mutex::new(attr.clone()),
            perf: Arc::new(perf),
            leader,
            group,
            key,
            state,
            parser: Parser::new(attr),
            ring: OnceLock::new(),
            redirect: Mutex::new(None),
            owner: (target == Target::CallingThread).then(gettid),
        })
    }

    pub fn state(&self) -> State {
        if self.ring.get().is_some_and(Ring::is_corrupt) {
            self.poison("ring is corrupt");
        }
        State::load(&self.state)
    }

    pub fn is_leader(&self) -> bool {
        self.leader.is_none()
    }

    /// The attribute the event was opened with.
    pub fn attr(&self) -> Attr {
        lock(&self.attr).clone()
    }

    pub fn label(&self) -> String {
        lock(&self.attr).label.clone()
    }

    /// Kernel id of the event, as found in [`Count::id`] and record `id` fields.
    pub fn id(&self) -> Result<u64> {
        let mut id = 0_u64;
        self.ioctl(|perf| ioctl_argp(perf, b::PERF_IOC_OP_ID as _, &mut id))?;
        Ok(id)
    }

    /// Starts counting, the whole group for a leader.
    pub fn enable(&self) -> Result<()> {
        self.group_ioctl(b::PERF_IOC_OP_ENABLE as _)?;
        self.set_state(State::Enabled);
        self.clear_hup();
        Ok(())
    }

    /// Stops counting, the whole group for a leader.
    pub fn disable(&self) -> Result<()> {
        self.group_ioctl(b::PERF_IOC_OP_DISABLE as _)?;
        self.set_state(State::Disabled);
        Ok(())
    }

    /// Zeroes the count, the whole group for a leader. The state is kept.
    pub fn reset(&self) -> Result<()> {
        self.group_ioctl(b::PERF_IOC_OP_RESET as _)
    }

    /// Enables the event for `n` more overflows, after which the kernel
    /// disables it and readers see [`Error::Disabled`].
    ///
    /// Valid on a disabled event, or on one opened with [`Opt::Disabled`]
    /// and not enabled since.
    pub fn refresh(&self, n: u32) -> Result<()> {
        let allowed = match self.state() {
            State::Disabled => true,
            State::Open => lock(&self.attr).get(Opt::Disabled),
            State::Enabled => false,
            State::Poisoned => return Err(Error::Poisoned),
        };
        if !allowed {
            return Err(Error::InvalidState("refresh needs a disabled event"));
        }
        self.ioctl(|perf| ioctl_arg(perf, b::PERF_IOC_OP_REFRESH as _, n as u64))?;
        State::transition(&self.state, State::Enabled);
        self.clear_hup();
        Ok(())
    }

    /// Changes the sample period, or the frequency for events sampling by frequency.
    pub fn set_period(&self, n: u64) -> Result<()> {
        let mut arg = n;
        self.ioctl(|perf| ioctl_argp(perf, b::PERF_IOC_OP_PERIOD as _, &mut arg))?;
        let mut attr = lock(&self.attr);
        match attr.sampling() {
            Sampling::Period(_) => attr.set_sample_period(n),
            Sampling::Frequency(_) => attr.set_sample_frequency(n),
        }
        Ok(())
    }

    /// Sets a tracepoint filter, e.g. `"common_pid == 42"`.
    pub fn set_filter(&self, filter: &str) -> Result<()> {
        let filter = CString::new(filter)
            .map_err(|_| Error::ConfigInvalid("filter contains a NUL byte".to_string()))?;
        let mut bytes = filter.into_bytes_with_nul();
        self.ioctl(|perf| ioctl_argp(perf, b::PERF_IOC_OP_SET_FILTER as _, bytes.as_mut_slice()))?;
        Ok(())
    }

    /// Attaches a loaded BPF program to a tracepoint or kprobe event.
    pub fn set_bpf(&self, prog: BorrowedFd<'_>) -> Result<()> {
        let fd = prog.as_raw_fd() as u64;
        self.ioctl(|perf| ioctl_arg(perf, b::PERF_IOC_OP_SET_BPF as _, fd))?;
        Ok(())
    }

    /// Pauses or resumes writing to the ring.
    ///
    /// Records generated while paused are dropped and counted as lost.
    pub fn pause_output(&self, pause: bool) -> Result<()> {
        self.ioctl(|perf| ioctl_arg(perf, b::PERF_IOC_OP_PAUSE_OUTPUT as _, pause as u64))?;
        Ok(())
    }

    /// Ids of the BPF programs attached to the event, up to `max`.
    ///
    /// The second value is the number of ids left out when more than `max`
    /// programs are attached.
    pub fn query_bpf(&self, max: u32) -> Result<(Vec<u32>, Option<u32>)> {
        // struct perf_event_query_bpf {
        //     u32 ids_len;
        //     u32 prog_cnt;
        //     u32 ids[0];
        // }
        let mut buf = vec![0_u32; 2 + max as usize];
        buf[0] = max;
        let query = self.ioctl(|perf| {
            ioctl_argp(perf, b::PERF_IOC_OP_QUERY_BPF as _, buf.as_mut_slice())
        });
        match query {
            Ok(_) => {
                let n = (buf[1] as usize).min(max as usize);
                Ok((buf[2..2 + n].to_vec(), None))
            }
            Err(e) if e.raw_os_error() == Some(libc::ENOSPC) => {
                Ok((buf[2..].to_vec(), Some(buf[1].saturating_sub(max))))
            }
            Err(e) => Err(e),
        }
    }

    /// Replaces the event selection of an opened event.
    ///
    /// Only the type and config words are taken from `attr`. The kernel
    /// supports this for breakpoints.
    pub fn modify_attributes(&self, attr: &Attr) -> Result<()> {
        attr.validate()?;
        let mut bytes = attr.encode();
        self.ioctl(|perf| {
            ioctl_argp(perf, b::PERF_IOC_OP_MODIFY_ATTRIBUTES as _, bytes.as_mut_bytes())
        })?;

        let mut current = lock(&self.attr);
        current.ty = attr.ty;
        current.config = attr.config;
        current.config1 = attr.config1;
        current.config2 = attr.config2;
        current.config3 = attr.config3;
        current.bp_type = attr.bp_type;
        Ok(())
    }

    /// Reads the count of this event alone.
    ///
    /// Fails with [`Error::InvalidState`] for a grouped count format,
    /// use [`read_group_count`][Self::read_group_count] there.
    pub fn read_count(&self) -> Result<Count> {
        let read_format = self.parser.read_format;
        if read_format & b::PERF_FORMAT_GROUP as u64 != 0 {
            return Err(Error::InvalidState("grouped count format needs read_group_count"));
        }
        let buf = self.read_counts(stat::read_size(read_format, 1))?;
        let mut count = stat::parse_count(&mut Cursor::new(&buf), read_format).ok_or_else(short)?;
        count.label = self.label();
        Ok(count)
    }

    /// Reads every member of the group in one go, in member order.
    pub fn read_group_count(&self) -> Result<GroupCount> {
        let read_format = self.parser.read_format;
        if !self.is_leader() || read_format & b::PERF_FORMAT_GROUP as u64 == 0 {
            return Err(Error::NotAGroupLeader);
        }
        let buf = self.read_counts(stat::read_size(read_format, self.group.len()))?;
        let mut counts = stat::parse_group(&mut Cursor::new(&buf), read_format).ok_or_else(short)?;
        self.group.label(&mut counts);
        Ok(counts)
    }

    fn read_counts(&self, len: usize) -> Result<Vec<u8>> {
        self.check()?;
        let mut buf = vec![0; len];
        let n = retry(|| read(&self.perf, &mut buf))
            .map_err(|e| self.fail(Error::os(e, Origin::Read)))?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Counts the work done by `f`: reset, enable, run `f`, disable, read.
    pub fn measure(&self, f: impl FnOnce()) -> Result<Count> {
        self.reset()?;
        self.enable()?;
        f();
        self.disable()?;
        self.read_count()
    }

    /// Like [`measure`][Self::measure] for the whole group of a leader.
    pub fn measure_group(&self, f: impl FnOnce()) -> Result<GroupCount> {
        if !self.is_leader() {
            return Err(Error::NotAGroupLeader);
        }
        self.reset()?;
        self.enable()?;
        f();
        self.disable()?;
        self.read_group_count()
    }

    /// Maps a ring of 2^7 data pages.
    pub fn map_ring(&self) -> Result<()> {
        self.map_ring_sized(DEFAULT_EXP)
    }

    /// Maps a ring of 2^`exp` data pages, plus the metadata page.
    ///
    /// An event has at most one ring.
    pub fn map_ring_sized(&self, exp: u8) -> Result<()> {
        self.check()?;
        if self.ring.get().is_some() {
            return Err(Error::InvalidState("ring already mapped"));
        }
        let ring = Ring::map(self.perf.clone(), self.decoder(), exp)?;
        self.ring
            .set(ring)
            .map_err(|_| Error::InvalidState("ring already mapped"))
    }

    /// Sends this event's records into the ring of `target`.
    ///
    /// With [`identifier`][crate::config::SampleFormat::identifier] in the
    /// sample format, records coming from this event are decoded with its own
    /// attribute and labels on the target's side.
    pub fn set_output(&self, target: &Event<'_>) -> Result<()> {
        let ring = target.ring.get().ok_or(Error::RingNotMapped)?;
        let fd = target.perf.as_raw_fd() as u64;
        self.ioctl(|perf| ioctl_arg(perf, b::PERF_IOC_OP_SET_OUTPUT as _, fd))?;

        let previous = lock(&self.redirect).take();
        if let Some((registry, id)) = previous {
            registry.remove(id);
        }
        if self.parser.has(b::PERF_SAMPLE_IDENTIFIER) {
            let id = self.id()?;
            ring.registry().insert(id, self.decoder());
            *lock(&self.redirect) = Some((ring.registry().clone(), id));
        }
        log::debug!("{:?} redirected into {:?}", self.label(), target.label());
        Ok(())
    }

    /// Blocks until a record is available in the ring.
    ///
    /// Fails with [`Error::DeadlineExceeded`] or [`Error::Canceled`] as told
    /// by `ctx`, leaving the ring untouched, and with [`Error::Disabled`] once
    /// the event hung up and the ring is drained. The ring has a single
    /// consumer: while one thread is blocked here, others get
    /// [`Error::InvalidState`] right away.
    pub fn read_record(&self, ctx: &ReadCtx) -> Result<Record> {
        let ring = self.reader()?;
        ring.read_record(ctx).map_err(|e| self.fail(e))
    }

    /// Drains the records available now, without blocking.
    pub fn records(&self) -> Result<Records<'_>> {
        Ok(Records::new(self.reader()?))
    }

    /// Records as a [`Stream`][futures::Stream].
    pub fn records_async(&self) -> Result<RecordStream<'_>> {
        RecordStream::new(self.reader()?, self.perf.clone())
    }

    /// Enabled time from the ring's metadata page, without a syscall.
    pub fn time_enabled(&self) -> Result<u64> {
        Ok(self.ring()?.times().0)
    }

    /// Running time from the ring's metadata page, without a syscall.
    pub fn time_running(&self) -> Result<u64> {
        Ok(self.ring()?.times().1)
    }

    /// Unmaps the ring, leaves the group and closes the fd, in that order.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let result = match self.ring.take() {
            Some(ring) => ring.close(),
            None => Ok(()),
        };
        let redirect = self
            .redirect
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((registry, id)) = redirect {
            registry.remove(id);
        }
        self.group.leave(self.key);
        result
    }

    fn decoder(&self) -> Decoder {
        Decoder {
            parser: self.parser,
            label: self.label(),
            group: self.group.clone(),
        }
    }

    fn ring(&self) -> Result<&Ring> {
        self.ring.get().ok_or(Error::RingNotMapped)
    }

    /// The ring, as long as it can still be read from.
    fn reader(&self) -> Result<&Ring> {
        let ring = self.ring()?;
        if ring.is_corrupt() {
            self.poison("ring is corrupt");
            return Err(Error::CorruptRing);
        }
        self.check()?;
        Ok(ring)
    }

    fn clear_hup(&self) {
        if let Some(ring) = self.ring.get() {
            ring.clear_hup();
        }
    }

    fn set_state(&self, state: State) {
        if self.is_leader() {
            self.group.set_state(state);
        } else {
            State::transition(&self.state, state);
        }
    }

    fn check(&self) -> Result<()> {
        match self.state() {
            State::Poisoned => Err(Error::Poisoned),
            _ => Ok(()),
        }
    }

    fn poison(&self, why: impl Display) {
        if self.state.swap(State::Poisoned as u8, Ordering::AcqRel) != State::Poisoned as u8 {
            log::warn!("event {:?} poisoned: {why}", lock(&self.attr).label);
        }
    }

    fn fail(&self, e: Error) -> Error {
        if e.is_fatal() || matches!(e, Error::CorruptRing) {
            self.poison(&e);
        }
        e
    }

    fn ioctl(&self, mut f: impl FnMut(&File) -> io::Result<i32>) -> Result<i32> {
        self.check()?;
        if let Some(owner) = self.owner {
            let tid = gettid();
            if tid != owner {
                log::warn!("event of thread {owner} driven from thread {tid}");
            }
        }
        retry(|| f(&self.perf)).map_err(|e| self.fail(Error::os(e, Origin::Ioctl)))
    }

    fn group_ioctl(&self, op: u64) -> Result<()> {
        let flag = if self.is_leader() {
            b::PERF_IOC_FLAG_GROUP as u64
        } else {
            0
        };
        self.ioctl(|perf| ioctl_arg(perf, op, flag))?;
        Ok(())
    }
}

impl Drop for Event<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::error!("failed to release event: {e}");
        }
    }
}

impl AsFd for Event<'_> {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.perf.as_fd()
    }
}

impl AsRawFd for Event<'_> {
    fn as_raw_fd(&self) -> RawFd {
        self.perf.as_raw_fd()
    }
}

fn short() -> Error {
    Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "short count read"))
}
