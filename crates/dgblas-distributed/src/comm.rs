//! Process groups
//!
//! A [`Communicator`] is a handle on one rank of a process group. Sends are
//! buffered and never block; receives block until the matching message from
//! the given source arrives. Messages between one pair of ranks are delivered
//! in the order they were sent.
//!
//! [`ThreadComm`] connects `n` ranks living in threads of one process, which
//! is how the collective code paths are exercised without an external
//! message-passing runtime. [`SelfComm`] is the trivial group of one.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Identity of a process group; all ranks of one group share it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupId(Uuid);

impl GroupId {
    /// Fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle on one rank of a process group
pub trait Communicator: Clone + Send + Sync + fmt::Debug {
    /// This rank, in `0..size()`
    fn rank(&self) -> usize;

    /// Number of ranks in the group
    fn size(&self) -> usize;

    /// Identity shared by every rank of the group
    fn group_id(&self) -> GroupId;

    /// Buffered send of `bytes` to rank `dest`
    fn send(&self, dest: usize, bytes: Vec<u8>) -> Result<()>;

    /// Blocking receive of the next message from rank `source`
    fn recv(&self, source: usize) -> Result<Vec<u8>>;

    /// Fail with `InvalidRank` unless `rank` is in the group
    fn check_rank(&self, rank: usize) -> Result<()> {
        if rank >= self.size() {
            return Err(Error::InvalidRank {
                rank,
                size: self.size(),
            });
        }
        Ok(())
    }
}

/// Group consisting of the calling process only
#[derive(Clone, Debug)]
pub struct SelfComm {
    group: GroupId,
    loopback: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl SelfComm {
    pub fn new() -> Self {
        Self {
            group: GroupId::new(),
            loopback: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

impl Default for SelfComm {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn group_id(&self) -> GroupId {
        self.group
    }

    fn send(&self, dest: usize, bytes: Vec<u8>) -> Result<()> {
        self.check_rank(dest)?;
        self.loopback
            .lock()
            .map_err(|_| Error::Communication("loopback queue poisoned".to_string()))?
            .push_back(bytes);
        Ok(())
    }

    fn recv(&self, source: usize) -> Result<Vec<u8>> {
        self.check_rank(source)?;
        self.loopback
            .lock()
            .map_err(|_| Error::Communication("loopback queue poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| Error::Communication("receive from self without a pending send".to_string()))
    }
}

#[derive(Debug)]
struct Endpoints {
    /// Indexed by destination rank
    senders: Vec<Sender<Vec<u8>>>,
    /// Indexed by source rank
    receivers: Vec<Mutex<Receiver<Vec<u8>>>>,
}

/// Rank of an in-process group whose ranks run on separate threads
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    group: GroupId,
    endpoints: Arc<Endpoints>,
}

impl ThreadComm {
    /// Create the `n` rank handles of a new group, one channel per ordered
    /// pair of ranks
    pub fn group(n: usize) -> Vec<ThreadComm> {
        let group = GroupId::new();
        let mut senders: Vec<Vec<Sender<Vec<u8>>>> = (0..n).map(|_| Vec::with_capacity(n)).collect();
        let mut receivers: Vec<Vec<Mutex<Receiver<Vec<u8>>>>> =
            (0..n).map(|_| Vec::with_capacity(n)).collect();

        for src in 0..n {
            for dst in 0..n {
                let (tx, rx) = mpsc::channel();
                senders[src].push(tx);
                // receivers[dst] ends up indexed by src
                receivers[dst].push(Mutex::new(rx));
            }
        }

        debug!(size = n, %group, "created thread group");
        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| ThreadComm {
                rank,
                size: n,
                group,
                endpoints: Arc::new(Endpoints { senders, receivers }),
            })
            .collect()
    }

    /// Run `f` on every rank of a fresh group of `n` threads
    ///
    /// Results are returned in rank order. A panic on any rank is
    /// propagated after all threads have finished.
    pub fn run<F, R>(n: usize, f: F) -> Vec<R>
    where
        F: Fn(ThreadComm) -> R + Sync,
        R: Send,
    {
        let f = &f;
        std::thread::scope(|scope| {
            let handles: Vec<_> = Self::group(n)
                .into_iter()
                .map(|comm| scope.spawn(move || f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn group_id(&self) -> GroupId {
        self.group
    }

    fn send(&self, dest: usize, bytes: Vec<u8>) -> Result<()> {
        self.check_rank(dest)?;
        self.endpoints.senders[dest].send(bytes).map_err(|_| {
            Error::Communication(format!("rank {dest} dropped its endpoint"))
        })
    }

    fn recv(&self, source: usize) -> Result<Vec<u8>> {
        self.check_rank(source)?;
        let receiver = self.endpoints.receivers[source]
            .lock()
            .map_err(|_| Error::Communication(format!("receiver for rank {source} poisoned")))?;
        receiver.recv().map_err(|_| {
            Error::Communication(format!("rank {source} dropped its endpoint"))
        })
    }
}
