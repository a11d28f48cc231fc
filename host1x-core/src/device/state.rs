/// Register file of a device class.
///
/// Every register is a plain 32 bit word addressed by its byte offset. Some
/// offsets carry a hook, which `write` hands back to the owner so it can run
/// the side effect after the word is stored.
pub struct DeviceState<H> {
    name: &'static str,
    registers: Box<[u32]>,
    // sorted by offset
    hooks: Vec<(u32, H)>,
}

impl<H: Copy> DeviceState<H> {
    /// `size` is the size of the register block in bytes.
    pub fn new(name: &'static str, size: u32, hooks: impl IntoIterator<Item = (u32, H)>) -> Self {
        let mut hooks: Vec<_> = hooks.into_iter().collect();
        hooks.sort_by_key(|(offset, _)| *offset);

        for window in hooks.windows(2) {
            assert_ne!(window[0].0, window[1].0, "{}: two hooks on one offset", name);
        }
        for (offset, _) in &hooks {
            assert!(
                offset % 4 == 0 && *offset < size,
                "{}: bad hook offset {:#x}",
                name,
                offset
            );
        }

        Self {
            name,
            registers: vec![0; (size / 4) as usize].into_boxed_slice(),
            hooks,
        }
    }

    pub fn size(&self) -> u32 {
        self.registers.len() as u32 * 4
    }

    pub fn read(&self, offset: u32) -> u32 {
        match self.registers.get((offset / 4) as usize) {
            Some(value) => *value,
            None => {
                log::warn!("{}: read from unknown register {:#x}", self.name, offset);
                0
            }
        }
    }

    /// Stores `data` and returns the hook registered for `offset`, if any.
    ///
    /// Writes outside the register block are dropped and never return a hook.
    pub fn write(&mut self, offset: u32, data: u32) -> Option<H> {
        match self.registers.get_mut((offset / 4) as usize) {
            Some(register) => *register = data,
            None => {
                log::warn!(
                    "{}: write to unknown register {:#x} = {:08X}",
                    self.name,
                    offset,
                    data
                );
                return None;
            }
        }

        self.hooks
            .binary_search_by_key(&(offset & !3), |(hook_offset, _)| *hook_offset)
            .ok()
            .map(|index| self.hooks[index].1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Hook {
        First,
        Second,
    }

    #[test]
    fn plain_registers_store_and_load() {
        let mut state = DeviceState::<Hook>::new("test", 0x20, []);
        assert_eq!(state.size(), 0x20);
        assert_eq!(state.read(0x8), 0);

        assert_eq!(state.write(0x8, 0xDEADBEEF), None);
        assert_eq!(state.read(0x8), 0xDEADBEEF);
        assert_eq!(state.read(0x4), 0);
    }

    #[test]
    fn hooked_registers_store_and_return_hook() {
        let mut state = DeviceState::new("test", 0x20, [(0x10, Hook::Second), (0x0, Hook::First)]);

        assert_eq!(state.write(0x0, 1), Some(Hook::First));
        assert_eq!(state.write(0x10, 2), Some(Hook::Second));
        assert_eq!(state.write(0x14, 3), None);

        assert_eq!(state.read(0x0), 1);
        assert_eq!(state.read(0x10), 2);
    }

    #[test]
    fn out_of_range_is_dropped() {
        let mut state = DeviceState::new("test", 0x10, [(0x0, Hook::First)]);
        assert_eq!(state.write(0x10, 5), None);
        assert_eq!(state.read(0x10), 0);
    }

    #[test]
    #[should_panic(expected = "two hooks on one offset")]
    fn duplicate_hooks_panic() {
        DeviceState::new("test", 0x10, [(0x4, Hook::First), (0x4, Hook::Second)]);
    }
}
