//! A serializing resumer: continuations posted to a strand run one at a
//! time, in FIFO order, on top of any underlying resumer. Used to keep
//! single-threaded invariants on a multi-threaded scheduler.

use super::{with_scheduler_id, Resumer, Scheduler};
use crate::continuation::Continuation;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

pub struct Strand {
    under: Resumer,
    weak: Weak<Strand>,
    st: Mutex<StrandSt>,
}

struct StrandSt {
    queue: VecDeque<Continuation>,
    running: bool,
}

impl Strand {
    pub fn new(under: Resumer) -> Arc<Self> {
        Arc::new_cyclic(|weak| Strand {
            under,
            weak: weak.clone(),
            st: Mutex::new(StrandSt { queue: VecDeque::new(), running: false }),
        })
    }

    fn drain(self: Arc<Self>) {
        let id = Arc::as_ptr(&self) as usize;
        with_scheduler_id(id, || loop {
            let cont = {
                let mut st = self.st.lock();
                match st.queue.pop_front() {
                    Some(c) => c,
                    None => {
                        st.running = false;
                        return;
                    }
                }
            };
            cont.resume();
        })
    }
}

impl Scheduler for Strand {
    fn post(&self, cont: Continuation) {
        let schedule = {
            let mut st = self.st.lock();
            st.queue.push_back(cont);
            if st.running {
                false
            } else {
                st.running = true;
                true
            }
        };
        if schedule {
            let this = self.weak.upgrade().expect("strand posted to during teardown");
            self.under.post(Continuation::from_fn(move || this.drain()));
        }
    }
}
