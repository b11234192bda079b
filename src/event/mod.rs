//! Event configurators.
//!
//! A configurator turns a high-level description of an event into the
//! type and config words of an [`Attr`].

use crate::config::Attr;
use crate::error::Result;

pub mod bp;
pub mod dp;
pub mod hw;
pub mod raw;
pub mod sw;
pub mod tp;

#[cfg(test)]
mod test;

/// Writes the event selection into an attribute.
///
/// On failure the attribute is left unchanged.
pub trait Configure {
    fn configure(&self, attr: &mut Attr) -> Result<()>;
}

impl<T: Configure + ?Sized> Configure for &T {
    fn configure(&self, attr: &mut Attr) -> Result<()> {
        (**self).configure(attr)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct EventConfig {
    pub ty: u32,
    pub config: u64,
    pub config1: u64,
    pub config2: u64,
    pub config3: u64,
    pub bp_type: u32,
}

impl EventConfig {
    fn apply(self, attr: &mut Attr) {
        attr.ty = self.ty;
        attr.config = self.config;
        attr.config1 = self.config1;
        attr.config2 = self.config2;
        attr.config3 = self.config3;
        attr.bp_type = self.bp_type;
    }
}

macro_rules! configure {
    ($ty:ty, $value:ident, $impl:expr) => {
        impl crate::event::Configure for $ty {
            fn configure(&self, attr: &mut crate::config::Attr) -> crate::error::Result<()> {
                let $value = self;
                let build = || -> crate::error::Result<crate::event::EventConfig> { $impl };
                build()?.apply(attr);
                Ok(())
            }
        }
    };
}
use configure;
