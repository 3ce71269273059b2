//! A one-way counting latch for parking OS threads.

use parking_lot::{Condvar, Mutex};

pub struct Latch {
    count: Mutex<usize>,
    cv: Condvar,
}

impl Latch {
    pub fn new(n: usize) -> Self {
        Latch { count: Mutex::new(n), cv: Condvar::new() }
    }

    pub fn count_down(&self) {
        let mut count = self.count.lock();
        assert!(*count > 0, "latch counted below zero");
        *count -= 1;
        if *count == 0 {
            self.cv.notify_all();
        }
    }

    pub fn try_wait(&self) -> bool {
        *self.count.lock() == 0
    }

    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.cv.wait(&mut count);
        }
    }
}
