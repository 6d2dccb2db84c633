//! Canonical encoding of pure (non-object) input values

use crate::codec::BcsWriter;
use crate::types::Address;

/// A value that can be passed as a pure input
pub trait ToPure {
    fn write_pure(&self, w: &mut BcsWriter);

    fn to_pure(&self) -> Vec<u8> {
        let mut w = BcsWriter::new();
        self.write_pure(&mut w);
        w.finish()
    }
}

macro_rules! impl_to_pure_int {
    ($($ty:ty => $method:ident),* $(,)?) => {
        $(
            impl ToPure for $ty {
                fn write_pure(&self, w: &mut BcsWriter) {
                    w.$method(*self);
                }
            }
        )*
    };
}

impl_to_pure_int!(
    u8 => write_u8,
    u16 => write_u16,
    u32 => write_u32,
    u64 => write_u64,
    u128 => write_u128,
    bool => write_bool,
);

impl ToPure for Address {
    fn write_pure(&self, w: &mut BcsWriter) {
        w.write_address(self);
    }
}

impl ToPure for str {
    fn write_pure(&self, w: &mut BcsWriter) {
        w.write_str(self);
    }
}

impl ToPure for String {
    fn write_pure(&self, w: &mut BcsWriter) {
        w.write_str(self);
    }
}

impl<T: ToPure> ToPure for [T] {
    fn write_pure(&self, w: &mut BcsWriter) {
        w.write_seq(self, |w, item| item.write_pure(w));
    }
}

impl<T: ToPure> ToPure for Vec<T> {
    fn write_pure(&self, w: &mut BcsWriter) {
        self.as_slice().write_pure(w);
    }
}

impl<T: ToPure> ToPure for Option<T> {
    fn write_pure(&self, w: &mut BcsWriter) {
        w.write_option(self.as_ref(), |w, value| value.write_pure(w));
    }
}

impl<T: ToPure + ?Sized> ToPure for &T {
    fn write_pure(&self, w: &mut BcsWriter) {
        (**self).write_pure(w);
    }
}
