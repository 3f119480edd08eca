/// Fixed-capacity FIFO of response times.
///
/// Backed by a boxed slice plus a head index, so pushing into a full
/// window overwrites the oldest slot instead of shifting the rest.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    slots: Box<[f64]>,
    /// Index of the oldest sample.
    head: usize,
    len: usize,
}

impl RingBuffer {
    /// A zero capacity is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![0.0; capacity.max(1)].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append a value, returning the evicted oldest value when full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let cap = self.capacity();
        if self.len < cap {
            self.slots[(self.head + self.len) % cap] = value;
            self.len += 1;
            None
        } else {
            let evicted = std::mem::replace(&mut self.slots[self.head], value);
            self.head = (self.head + 1) % cap;
            Some(evicted)
        }
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Samples in arrival order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let cap = self.capacity();
        (0..self.len).map(move |i| self.slots[(self.head + i) % cap])
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.iter().sum::<f64>() / self.len as f64)
    }
}
