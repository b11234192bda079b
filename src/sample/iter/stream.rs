use std::fs::File;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, JoinHandle};

use futures::Stream;

use crate::error::{Error, Origin, Result};
use crate::ffi::syscall::{epoll_create1, epoll_ctl, epoll_wait, eventfd, write};
use crate::sample::record::Record;
use crate::sample::Ring;

const PERF: u64 = 0;
const STOP: u64 = 1;

/// Records as a [`Stream`], woken by readiness of the event fd.
///
/// A helper thread waits on the fd with epoll and wakes the task when the
/// kernel signals new data, so the wakeup settings of the attribute decide
/// how often the stream is polled. The stream ends once the event hangs up
/// and the ring is drained.
///
/// # Examples
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use perf_event_ring::config::{Attr, Cpu, Target};
/// use perf_event_ring::count::Event;
/// use perf_event_ring::event::{sw::Software, Configure};
///
/// let mut attr = Attr::default();
/// Software::TaskClock.configure(&mut attr).unwrap();
/// attr.set_sample_period(1_000_000);
/// attr.sample_format.ip = true;
///
/// let event = Event::open(&attr, Target::CallingThread, Cpu::Any, None).unwrap();
/// event.map_ring().unwrap();
///
/// futures::executor::block_on(async {
///     let mut stream = event.records_async().unwrap();
///     while let Some(record) = stream.next().await {
///         println!("{:?}", record.unwrap());
///     }
/// });
/// ```
pub struct RecordStream<'a> {
    ring: &'a Ring,
    waker: Option<SyncSender<Waker>>,
    stop: Arc<File>,
    closed: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    done: bool,
}

impl<'a> RecordStream<'a> {
    pub(crate) fn new(ring: &'a Ring, perf: Arc<File>) -> Result<Self> {
        let os = |e| Error::os(e, Origin::Read);
        let epoll = epoll_create1(libc::O_CLOEXEC).map_err(os)?;
        let stop = Arc::new(eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK).map_err(os)?);

        let mut event = libc::epoll_event {
            events: libc::EPOLLIN as _,
            u64: PERF,
        };
        epoll_ctl(&epoll, libc::EPOLL_CTL_ADD, &perf, &mut event).map_err(os)?;
        let mut event = libc::epoll_event {
            events: libc::EPOLLIN as _,
            u64: STOP,
        };
        epoll_ctl(&epoll, libc::EPOLL_CTL_ADD, &stop, &mut event).map_err(os)?;

        let (tx, rx) = sync_channel::<Waker>(1);
        let closed = Arc::new(AtomicBool::new(false));
        let thread = {
            let closed = closed.clone();
            thread::Builder::new()
                .name("perf-ring-poll".to_string())
                .spawn(move || {
                    watch(&epoll, rx);
                    // The perf fd stays open until here, the thread holds it.
                    drop(perf);
                    closed.store(true, Ordering::SeqCst);
                })
                .map_err(Error::Io)?
        };

        Ok(Self {
            ring,
            waker: Some(tx),
            stop,
            closed,
            thread: Some(thread),
            done: false,
        })
    }
}

/// Wakes the received wakers on readiness, returns on hangup or stop.
fn watch(epoll: &File, rx: Receiver<Waker>) {
    // HUP and ERR are always reported, they need no registration.
    let mut events = [libc::epoll_event { events: 0, u64: 0 }; 2];
    'exit: while let Ok(waker) = rx.recv() {
        loop {
            let ready = match epoll_wait(epoll, &mut events, -1) {
                Ok(it) => it,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::error!("record stream stopped polling: {e}");
                    waker.wake();
                    break 'exit;
                }
            };

            let mut hup = false;
            for event in ready {
                let (data, flags) = (event.u64, event.events);
                if data == STOP {
                    break 'exit;
                }
                hup |= flags & (libc::EPOLLHUP | libc::EPOLLERR) as u32 != 0;
            }
            log::trace!("record stream woken, hup: {hup}");
            waker.wake();
            if hup {
                break 'exit;
            }
            break;
        }
    }
}

impl Stream for RecordStream<'_> {
    type Item = Result<Record>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match this.ring.try_next() {
                Ok(Some(record)) => return Poll::Ready(Some(Ok(record))),
                Err(e) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Ok(None) if this.closed.load(Ordering::SeqCst) => {
                    this.ring.set_hup();
                    this.done = true;
                    return Poll::Ready(None);
                }
                Ok(None) => (),
            }

            let Some(tx) = &this.waker else {
                return Poll::Ready(None);
            };
            match tx.try_send(cx.waker().clone()) {
                // A waker already queued belongs to this stream's task.
                Ok(()) | Err(TrySendError::Full(_)) => return Poll::Pending,
                // The watcher has exited, pop once more before ending.
                Err(TrySendError::Disconnected(_)) => {
                    this.closed.store(true, Ordering::SeqCst);
                }
            }
        }
    }
}

impl Drop for RecordStream<'_> {
    fn drop(&mut self) {
        if let Err(e) = write(&self.stop, &1u64.to_ne_bytes()) {
            log::warn!("failed to stop record stream watcher: {e}");
        }
        // Unblocks `recv` if the watcher is between waits.
        drop(self.waker.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("record stream watcher panicked");
            }
        }
    }
}
