//! Indexed binary min-heap used as the Dijkstra priority queue.
//!
//! Keys live outside the heap: every operation borrows the traversal's cost slice and
//! compares `cost[node]` values. Slots `[0, finite_len)` form a proper binary heap over
//! nodes with a finite cost. Slots `[finite_len, len)` hold nodes that have not been
//! reached yet, in arbitrary order. A node moves from the unreached pool into the heap
//! the first time its cost decreases.

/// Binary min-heap over node indices with O(log n) decrease-key.
#[derive(Debug, Clone)]
pub struct IndexedMinHeap {
    slots: Vec<usize>,
    position: Vec<Option<usize>>,
    finite_len: usize,
}

#[inline]
fn parent(slot: usize) -> usize {
    (slot - 1) / 2
}

impl IndexedMinHeap {
    /// Builds the heap over all `node_count` nodes. Nodes with a finite cost (the source
    /// and its seeded neighbours) are heapified; all others go to the unreached pool.
    pub fn build(node_count: usize, cost: &[f64]) -> Self {
        let mut heap = IndexedMinHeap {
            slots: Vec::with_capacity(node_count),
            position: vec![None; node_count],
            finite_len: 0,
        };
        for node_idx in 0..node_count {
            if cost[node_idx].is_finite() {
                let slot = heap.slots.len();
                heap.slots.push(node_idx);
                heap.position[node_idx] = Some(slot);
                heap.finite_len += 1;
                heap.sift_up(slot, cost);
            }
        }
        for node_idx in 0..node_count {
            if !cost[node_idx].is_finite() {
                heap.position[node_idx] = Some(heap.slots.len());
                heap.slots.push(node_idx);
            }
        }
        heap
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of nodes currently holding a finite key.
    #[inline]
    pub fn finite_len(&self) -> usize {
        self.finite_len
    }

    /// Whether `node_idx` is still waiting to be extracted.
    #[inline]
    pub fn contains(&self, node_idx: usize) -> bool {
        self.position[node_idx].is_some()
    }

    /// Removes and returns the node with the smallest cost. Once the finite partition
    /// is exhausted the unreached pool is drained in arbitrary order.
    pub fn extract_min(&mut self, cost: &[f64]) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        if self.finite_len == 0 {
            let node_idx = self.slots.pop()?;
            self.position[node_idx] = None;
            return Some(node_idx);
        }
        let min_idx = self.slots[0];
        let last_finite = self.finite_len - 1;
        self.swap(0, last_finite);
        // keep the unreached pool contiguous behind the heap
        let last = self.slots.len() - 1;
        self.swap(last_finite, last);
        self.slots.pop();
        self.position[min_idx] = None;
        self.finite_len -= 1;
        self.sift_down(0, cost);
        Some(min_idx)
    }

    /// Restores heap order after `cost[node_idx]` strictly decreased. The caller writes
    /// the new key into `cost` before calling.
    pub fn decrease_key(&mut self, node_idx: usize, cost: &[f64]) {
        let Some(mut slot) = self.position[node_idx] else {
            return;
        };
        if slot >= self.finite_len {
            let boundary = self.finite_len;
            self.swap(slot, boundary);
            self.finite_len += 1;
            slot = boundary;
        }
        self.sift_up(slot, cost);
    }

    #[inline]
    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.slots.swap(a, b);
        self.position[self.slots[a]] = Some(a);
        self.position[self.slots[b]] = Some(b);
    }

    fn sift_up(&mut self, mut slot: usize, cost: &[f64]) {
        while slot > 0 {
            let up = parent(slot);
            if cost[self.slots[slot]] < cost[self.slots[up]] {
                self.swap(slot, up);
                slot = up;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut slot: usize, cost: &[f64]) {
        loop {
            let left = slot * 2 + 1;
            let right = left + 1;
            if left >= self.finite_len {
                break;
            }
            // ties favour the left child
            let child = if right < self.finite_len
                && cost[self.slots[right]] < cost[self.slots[left]]
            {
                right
            } else {
                left
            };
            if cost[self.slots[child]] < cost[self.slots[slot]] {
                self.swap(slot, child);
                slot = child;
            } else {
                break;
            }
        }
    }

    #[cfg(test)]
    fn is_valid(&self, cost: &[f64]) -> bool {
        let heap_ok = (1..self.finite_len)
            .all(|slot| cost[self.slots[parent(slot)]] <= cost[self.slots[slot]]);
        let positions_ok = self
            .slots
            .iter()
            .enumerate()
            .all(|(slot, &node_idx)| self.position[node_idx] == Some(slot));
        heap_ok && positions_ok
    }
}
