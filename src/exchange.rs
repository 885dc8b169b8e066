use crate::{Frame, Result};
use std::{
  fmt,
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
  },
};
use tracing::debug;

/// Number of staging slots per session.
pub const SLOT_COUNT: usize = 2;

/// A GPU resource the CPU can read back, used as one half of the double buffer.
pub trait StagingSlot {
  /// The GPU surface type frames are delivered as.
  type Source: ?Sized;

  /// Copy `source` into this slot on the GPU.
  fn copy_from(&self, source: &Self::Source) -> Result<()>;

  /// Map the slot for reading and copy its pixels into a packed [`Frame`].
  fn read(&self) -> Result<Frame>;
}

struct State<Slot> {
  slots: Option<[Slot; SLOT_COUNT]>,
  write_index: usize,
  /// [`None`] until the first frame of the session is published.
  readable_index: Option<usize>,
  /// Bumped by every [`FrameExchange::install`] and [`FrameExchange::clear`].
  generation: u64,
}

/// Double-buffered hand-off between the frame delivery callback and a poller.
///
/// The producer copies each frame into the write slot and then swaps the roles,
/// the consumer always reads the readable slot.
/// Both happen under one lock, so a reader never sees a half-written slot.
pub struct FrameExchange<Slot> {
  state: Mutex<State<Slot>>,
  /// Only written with `state` locked.
  frame_count: AtomicU64,
}

impl<Slot> Default for FrameExchange<Slot> {
  fn default() -> Self {
    Self {
      state: Mutex::new(State {
        slots: None,
        write_index: 0,
        readable_index: None,
        generation: 0,
      }),
      frame_count: AtomicU64::new(0),
    }
  }
}

impl<Slot> fmt::Debug for FrameExchange<Slot> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.lock();
    f.debug_struct("FrameExchange")
      .field("has_slots", &state.slots.is_some())
      .field("write_index", &state.write_index)
      .field("readable_index", &state.readable_index)
      .field("generation", &state.generation)
      .field("frame_count", &self.frame_count())
      .finish()
  }
}

impl<Slot> FrameExchange<Slot> {
  #[inline]
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, State<Slot>> {
    // roles are only assigned after a successful copy, a poisoned state is still consistent
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Install the slots of a new session.
  /// Previous slots are released, the frame count is reset
  /// and publishers of previous sessions stop having any effect.
  pub fn install(self: &Arc<Self>, slots: [Slot; SLOT_COUNT]) -> Publisher<Slot> {
    let mut state = self.lock();
    state.slots = Some(slots);
    state.write_index = 0;
    state.readable_index = None;
    state.generation += 1;
    self.frame_count.store(0, Ordering::Release);

    Publisher {
      exchange: Arc::clone(self),
      generation: state.generation,
    }
  }

  /// Release both slots.
  /// After this returns no publisher can write a frame until the next [`Self::install`].
  pub fn clear(&self) {
    let mut state = self.lock();
    state.slots = None;
    state.write_index = 0;
    state.readable_index = None;
    state.generation += 1;
    self.frame_count.store(0, Ordering::Release);
  }

  /// Frames published since the current session started.
  #[inline]
  pub fn frame_count(&self) -> u64 {
    self.frame_count.load(Ordering::Acquire)
  }

  /// Whether a frame can be read right now.
  pub fn has_frame(&self) -> bool {
    let state = self.lock();
    state.slots.is_some() && state.readable_index.is_some()
  }
}

impl<Slot: StagingSlot> FrameExchange<Slot> {
  /// Copy `source` into the write slot and make it readable.
  ///
  /// Return `false` if the frame is dropped,
  /// either because `generation` is stale, no slots are installed or the copy failed.
  fn publish(&self, generation: u64, source: &Slot::Source) -> bool {
    let mut state = self.lock();
    if state.generation != generation {
      debug!(generation, current = state.generation, "drop frame of a stopped session");
      return false;
    }

    let index = state.write_index;
    let Some(slot) = state.slots.as_ref().map(|slots| &slots[index]) else {
      debug!("drop frame, no staging slot");
      return false;
    };

    if let Err(e) = slot.copy_from(source) {
      debug!(error = %e, "drop frame, copy failed");
      return false;
    }

    state.readable_index = Some(index);
    state.write_index = (index + 1) % SLOT_COUNT;
    self.frame_count.fetch_add(1, Ordering::AcqRel);
    true
  }

  /// Read the latest published frame.
  /// Return [`None`] if nothing is published yet.
  ///
  /// Reading doesn't consume the frame, polling twice returns the same pixels
  /// unless a new frame arrives in between.
  pub fn try_read(&self) -> Result<Option<Frame>> {
    let state = self.lock();
    let (Some(slots), Some(index)) = (state.slots.as_ref(), state.readable_index) else {
      return Ok(None);
    };
    slots[index].read().map(Some)
  }
}

/// Producer handle given to the frame delivery callback of one session.
pub struct Publisher<Slot> {
  exchange: Arc<FrameExchange<Slot>>,
  generation: u64,
}

impl<Slot> Clone for Publisher<Slot> {
  fn clone(&self) -> Self {
    Self {
      exchange: Arc::clone(&self.exchange),
      generation: self.generation,
    }
  }
}

impl<Slot> fmt::Debug for Publisher<Slot> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Publisher")
      .field("generation", &self.generation)
      .finish()
  }
}

impl<Slot: StagingSlot> Publisher<Slot> {
  /// See [`FrameExchange::publish`].
  #[inline]
  pub fn publish(&self, source: &Slot::Source) -> bool {
    self.exchange.publish(self.generation, source)
  }

  #[inline]
  pub const fn generation(&self) -> u64 {
    self.generation
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{MemorySlot, Surface};
  use crate::Error;
  use std::thread;

  fn slots(width: u32, height: u32) -> [MemorySlot; SLOT_COUNT] {
    [MemorySlot::new(width, height), MemorySlot::new(width, height)]
  }

  #[test]
  fn nothing_to_read_before_first_frame() {
    let exchange = Arc::new(FrameExchange::<MemorySlot>::new());
    assert!(exchange.try_read().unwrap().is_none());

    exchange.install(slots(4, 4));
    assert!(!exchange.has_frame());
    assert!(exchange.try_read().unwrap().is_none());
    assert_eq!(exchange.frame_count(), 0);
  }

  #[test]
  fn publish_swaps_roles() {
    let exchange = Arc::new(FrameExchange::new());
    let publisher = exchange.install(slots(2, 2));

    assert!(publisher.publish(&Surface::filled(2, 2, 1)));
    assert_eq!(exchange.frame_count(), 1);
    assert_eq!(exchange.try_read().unwrap().unwrap().pixel(0, 0)[0], 1);

    assert!(publisher.publish(&Surface::filled(2, 2, 2)));
    assert_eq!(exchange.frame_count(), 2);
    assert_eq!(exchange.try_read().unwrap().unwrap().pixel(1, 1)[0], 2);

    // the third frame goes back to the first slot
    assert!(publisher.publish(&Surface::filled(2, 2, 3)));
    assert_eq!(exchange.try_read().unwrap().unwrap().pixel(1, 0)[0], 3);
  }

  #[test]
  fn reading_does_not_consume() {
    let exchange = Arc::new(FrameExchange::new());
    let publisher = exchange.install(slots(3, 2));
    publisher.publish(&Surface::filled(3, 2, 7));

    let first = exchange.try_read().unwrap().unwrap();
    let second = exchange.try_read().unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(exchange.frame_count(), 1);
  }

  #[test]
  fn failed_copy_drops_frame() {
    let exchange = Arc::new(FrameExchange::new());
    let publisher = exchange.install(slots(2, 2));
    publisher.publish(&Surface::filled(2, 2, 1));

    // wrong size, the slot refuses to copy
    assert!(!publisher.publish(&Surface::filled(3, 3, 2)));
    assert_eq!(exchange.frame_count(), 1);
    assert_eq!(exchange.try_read().unwrap().unwrap().pixel(0, 0)[0], 1);
  }

  #[test]
  fn read_failure_is_reported() {
    let exchange = Arc::new(FrameExchange::new());
    let publisher = exchange.install(slots(2, 2));
    publisher.publish(&Surface::filled(2, 2, 1));

    exchange.lock().slots.as_ref().unwrap()[0].fail_reads(true);
    assert!(matches!(exchange.try_read(), Err(Error::Readback(_))));
  }

  #[test]
  fn clear_stops_stale_publishers() {
    let exchange = Arc::new(FrameExchange::new());
    let publisher = exchange.install(slots(2, 2));
    publisher.publish(&Surface::filled(2, 2, 1));

    exchange.clear();
    assert_eq!(exchange.frame_count(), 0);
    assert!(exchange.try_read().unwrap().is_none());

    // a late callback of the stopped session
    assert!(!publisher.publish(&Surface::filled(2, 2, 2)));
    assert!(exchange.try_read().unwrap().is_none());

    // and it can't write into the slots of the next session either
    let next = exchange.install(slots(2, 2));
    assert!(!publisher.publish(&Surface::filled(2, 2, 3)));
    assert!(exchange.try_read().unwrap().is_none());
    assert!(next.publish(&Surface::filled(2, 2, 4)));
    assert_eq!(exchange.try_read().unwrap().unwrap().pixel(0, 0)[0], 4);
    assert_ne!(publisher.generation(), next.generation());
  }

  #[test]
  fn reader_never_sees_torn_frame() {
    let exchange = Arc::new(FrameExchange::new());
    let publisher = exchange.install(slots(16, 16));

    let producer = thread::spawn(move || {
      for value in 0..500u32 {
        publisher.publish(&Surface::filled(16, 16, value as u8));
      }
    });

    let mut last_count = 0;
    while !producer.is_finished() {
      if let Some(frame) = exchange.try_read().unwrap() {
        let first = frame.data[0];
        assert!(frame.data.iter().all(|b| *b == first));
      }
      let count = exchange.frame_count();
      assert!(count >= last_count);
      last_count = count;
    }
    producer.join().unwrap();
    assert_eq!(exchange.frame_count(), 500);
  }
}
