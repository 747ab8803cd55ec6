use crate::error::PoolError;

use parking_lot::{Condvar, Mutex};

struct GateState {
  permits: usize,
  closed: bool,
}

/// A counting semaphore gating admission into the pool.
///
/// One permit corresponds to one slot of allowed backlog. A permit is
/// consumed by a successful [`acquire`](CapacityGate::acquire) or
/// [`try_acquire`](CapacityGate::try_acquire) and must be returned by
/// exactly one matching [`release`](CapacityGate::release), whether the
/// admitted task is later dequeued or the admission is aborted.
///
/// [`close`](CapacityGate::close) wakes every blocked acquirer with
/// [`PoolError::GateClosed`], so shutdown cannot strand a producer that is
/// parked waiting for capacity.
pub(crate) struct CapacityGate {
  state: Mutex<GateState>,
  available: Condvar,
}

impl CapacityGate {
  pub(crate) fn new(permits: usize) -> Self {
    Self {
      state: Mutex::new(GateState {
        permits,
        closed: false,
      }),
      available: Condvar::new(),
    }
  }

  /// Blocks until a permit is free, then consumes it.
  pub(crate) fn acquire(&self) -> Result<(), PoolError> {
    let mut state = self.state.lock();
    loop {
      if state.closed {
        return Err(PoolError::GateClosed);
      }
      if state.permits > 0 {
        state.permits -= 1;
        return Ok(());
      }
      self.available.wait(&mut state);
    }
  }

  /// Consumes a permit if one is free, without blocking.
  pub(crate) fn try_acquire(&self) -> Result<(), PoolError> {
    let mut state = self.state.lock();
    if state.closed {
      return Err(PoolError::GateClosed);
    }
    if state.permits > 0 {
      state.permits -= 1;
      Ok(())
    } else {
      Err(PoolError::AtCapacity)
    }
  }

  /// Returns one permit and wakes one blocked acquirer.
  pub(crate) fn release(&self) {
    let mut state = self.state.lock();
    state.permits += 1;
    drop(state);
    self.available.notify_one();
  }

  /// Fails all current and future acquisitions.
  pub(crate) fn close(&self) {
    let mut state = self.state.lock();
    state.closed = true;
    drop(state);
    self.available.notify_all();
  }

  /// The number of free permits right now.
  pub(crate) fn available_permits(&self) -> usize {
    self.state.lock().permits
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::thread;
  use std::time::Duration;

  #[test]
  fn acquire_release_symmetry() {
    let gate = CapacityGate::new(2);
    assert_eq!(gate.available_permits(), 2);

    gate.acquire().unwrap();
    gate.acquire().unwrap();
    assert_eq!(gate.available_permits(), 0);
    assert_eq!(gate.try_acquire(), Err(PoolError::AtCapacity));

    gate.release();
    assert_eq!(gate.available_permits(), 1);
    gate.try_acquire().unwrap();
    assert_eq!(gate.available_permits(), 0);
  }

  #[test]
  fn acquire_blocks_until_release() {
    let gate = Arc::new(CapacityGate::new(1));
    gate.acquire().unwrap();

    let waiter = {
      let gate = gate.clone();
      thread::spawn(move || gate.acquire())
    };

    // The waiter should still be parked on the gate.
    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());

    gate.release();
    waiter.join().unwrap().unwrap();
    assert_eq!(gate.available_permits(), 0);
  }

  #[test]
  fn close_wakes_blocked_acquirers() {
    let gate = Arc::new(CapacityGate::new(0));

    let waiter = {
      let gate = gate.clone();
      thread::spawn(move || gate.acquire())
    };

    thread::sleep(Duration::from_millis(50));
    gate.close();

    assert_eq!(waiter.join().unwrap(), Err(PoolError::GateClosed));
    assert_eq!(gate.try_acquire(), Err(PoolError::GateClosed));
  }
}
