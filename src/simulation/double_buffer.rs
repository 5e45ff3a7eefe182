/// Read/write pair of grid fields.
///
/// Two fixed storage slots plus the index of the slot currently holding the
/// readable state. Swapping flips the index; nothing is copied or moved.
#[derive(Debug)]
pub struct DoubleBuffer<F> {
    slots: [F; 2],
    read: usize,
}

impl<F> DoubleBuffer<F> {
    /// `first` starts out as the read field
    pub fn new(first: F, second: F) -> Self {
        Self {
            slots: [first, second],
            read: 0,
        }
    }

    pub fn read(&self) -> &F {
        &self.slots[self.read]
    }

    pub fn write(&self) -> &F {
        &self.slots[1 - self.read]
    }

    pub fn write_mut(&mut self) -> &mut F {
        &mut self.slots[1 - self.read]
    }

    /// Borrow the read field and the write field at the same time
    pub fn split_mut(&mut self) -> (&F, &mut F) {
        let [a, b] = &mut self.slots;
        if self.read == 0 {
            (&*a, b)
        } else {
            (&*b, a)
        }
    }

    /// Exchange roles after a pass has filled the write field
    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }

    /// Slot index (0 or 1) currently holding the readable state
    pub fn read_index(&self) -> usize {
        self.read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_exchanges_roles() {
        let mut buffer = DoubleBuffer::new("a", "b");
        assert_eq!(*buffer.read(), "a");
        assert_eq!(*buffer.write(), "b");
        buffer.swap();
        assert_eq!(*buffer.read(), "b");
        assert_eq!(*buffer.write(), "a");
    }

    #[test]
    fn test_double_swap_restores_identity() {
        let mut buffer = DoubleBuffer::new(vec![1.0f32], vec![2.0f32]);
        let read_before = buffer.read() as *const Vec<f32>;
        let write_before = buffer.write() as *const Vec<f32>;

        buffer.swap();
        buffer.swap();

        assert!(std::ptr::eq(buffer.read(), read_before));
        assert!(std::ptr::eq(buffer.write(), write_before));
        assert_eq!(buffer.read_index(), 0);
    }

    #[test]
    fn test_split_mut_targets_write_slot() {
        let mut buffer = DoubleBuffer::new(1, 2);
        buffer.swap();
        {
            let (read, write) = buffer.split_mut();
            assert_eq!(*read, 2);
            *write = *read * 10;
        }
        buffer.swap();
        assert_eq!(*buffer.read(), 20);
        assert_eq!(*buffer.write(), 2);
    }
}
