//! Keymap selection.
//!
//! The engine only tracks WHICH keymap is active; the translation
//! tables themselves live with the input layer outside this core.
//! Unknown selections keep the previous keymap.

/// Built-in keymap identities, id and name.
const KEYMAPS: &[(i32, &str)] = &[
    (0, "default"),
    (1, "linux"),
    (2, "solaris"),
    (3, "vt100"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeymapSelection {
    index: usize,
}

impl KeymapSelection {
    pub fn new() -> Self {
        KeymapSelection { index: 0 }
    }

    /// Select by numeric id. Returns false (keeping the previous
    /// keymap) for unknown ids.
    pub fn set_by_id(&mut self, id: i32) -> bool {
        match KEYMAPS.iter().position(|(kid, _)| *kid == id) {
            Some(index) => {
                self.index = index;
                true
            }
            None => {
                log::debug!("unknown keymap id {}, keeping {:?}", id, self.name());
                false
            }
        }
    }

    /// Select by name. Returns false for unknown names.
    pub fn set_by_name(&mut self, name: &str) -> bool {
        match KEYMAPS
            .iter()
            .position(|(_, kname)| kname.eq_ignore_ascii_case(name))
        {
            Some(index) => {
                self.index = index;
                true
            }
            None => {
                log::debug!("unknown keymap {:?}, keeping {:?}", name, self.name());
                false
            }
        }
    }

    pub fn id(&self) -> i32 {
        KEYMAPS[self.index].0
    }

    pub fn name(&self) -> &'static str {
        KEYMAPS[self.index].1
    }
}

impl Default for KeymapSelection {
    fn default() -> Self {
        Self::new()
    }
}
