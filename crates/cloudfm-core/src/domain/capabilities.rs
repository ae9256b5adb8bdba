//! Provider capabilities
//!
//! Each provider declares a fixed [`Capabilities`] set. The set is the single
//! source of truth for which dialog tabs and actions are offered; use cases
//! consult it before invoking an optional provider operation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A named operation a provider may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Save,
    Resave,
    Export,
    Load,
    List,
    Remove,
    Rename,
    Close,
    SetFolder,
}

impl Capability {
    /// Every capability, in declaration order
    pub const ALL: [Capability; 9] = [
        Capability::Save,
        Capability::Resave,
        Capability::Export,
        Capability::Load,
        Capability::List,
        Capability::Remove,
        Capability::Rename,
        Capability::Close,
        Capability::SetFolder,
    ];

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Capability::Save => "save",
            Capability::Resave => "resave",
            Capability::Export => "export",
            Capability::Load => "load",
            Capability::List => "list",
            Capability::Remove => "remove",
            Capability::Rename => "rename",
            Capability::Close => "close",
            Capability::SetFolder => "setFolder",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-capability overrides from provider configuration
///
/// `true` grants, `false` revokes; absent keys keep the provider default.
pub type CapabilityOverrides = BTreeMap<Capability, bool>;

/// A set of [`Capability`] values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u16);

impl Capabilities {
    /// The empty set
    pub const fn none() -> Self {
        Self(0)
    }

    /// Every capability
    pub fn all() -> Self {
        Self::from_iter(Capability::ALL)
    }

    /// Adds `capability`
    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    /// Removes `capability`
    #[must_use]
    pub const fn without(self, capability: Capability) -> Self {
        Self(self.0 & !capability.bit())
    }

    pub const fn has(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Applies configured overrides on top of the provider's defaults
    #[must_use]
    pub fn apply(self, overrides: &CapabilityOverrides) -> Self {
        overrides.iter().fold(self, |caps, (cap, enabled)| {
            if *enabled {
                caps.with(*cap)
            } else {
                caps.without(*cap)
            }
        })
    }

    /// The contained capabilities in declaration order
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.has(*c))
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), Capabilities::with)
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter().map(|c| c.name()).collect();
        write!(f, "{}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_and_without() {
        let caps = Capabilities::none()
            .with(Capability::Save)
            .with(Capability::Load);
        assert!(caps.has(Capability::Save));
        assert!(caps.has(Capability::Load));
        assert!(!caps.has(Capability::List));

        let caps = caps.without(Capability::Save);
        assert!(!caps.has(Capability::Save));
        assert!(caps.has(Capability::Load));
    }

    #[test]
    fn test_all_contains_every_capability() {
        let caps = Capabilities::all();
        assert_eq!(caps.iter().count(), Capability::ALL.len());
        assert!(!caps.is_empty());
        assert!(Capabilities::none().is_empty());
    }

    #[test]
    fn test_overrides() {
        let mut overrides = CapabilityOverrides::new();
        overrides.insert(Capability::Remove, false);
        overrides.insert(Capability::SetFolder, true);

        let caps = Capabilities::from_iter([Capability::Save, Capability::Remove]).apply(&overrides);
        assert!(caps.has(Capability::Save));
        assert!(!caps.has(Capability::Remove));
        assert!(caps.has(Capability::SetFolder));
    }

    #[test]
    fn test_overrides_deserialize_from_camel_case() {
        let overrides: CapabilityOverrides =
            serde_yaml::from_str("remove: false\nsetFolder: true\n").unwrap();
        assert_eq!(overrides.get(&Capability::Remove), Some(&false));
        assert_eq!(overrides.get(&Capability::SetFolder), Some(&true));
    }

    #[test]
    fn test_display_lists_names() {
        let caps = Capabilities::from_iter([Capability::Load, Capability::Save]);
        assert_eq!(caps.to_string(), "save, load");
    }
}
