//! Typed argument lists for constructors, initializers and clients.
//!
//! An argument list is a tuple of zero to six `Arc<_>` handles. Each
//! element may be a concrete type or a trait object:
//!
//! ```rust
//! use ferrous_locator::{key_of, ArgList};
//! use std::sync::Arc;
//!
//! trait Clock: Send + Sync {}
//! struct Settings;
//!
//! type Deps = (Arc<dyn Clock>, Arc<Settings>);
//! assert_eq!(<Deps as ArgList>::ARITY, 2);
//! assert_eq!(Deps::keys()[0], key_of::<dyn Clock>());
//! ```

use std::sync::Arc;

use smallvec::{smallvec, SmallVec};

use crate::key::{key_of, Key};
use crate::types::Instance;

/// Largest supported argument count.
pub const MAX_ARITY: usize = 6;

/// Keys of an argument list, in declaration order.
pub type ArgKeys = SmallVec<[Key; MAX_ARITY]>;

/// A fixed-size, strongly typed list of service arguments.
pub trait ArgList: Sized + Send + Sync + 'static {
    /// Number of arguments.
    const ARITY: usize;

    /// The requested key of each argument.
    fn keys() -> ArgKeys;

    /// Rebuilds the typed tuple from realized instances. `None` when the
    /// count differs or an instance does not satisfy its slot.
    fn from_instances(args: &[Instance]) -> Option<Self>;
}

/// A service that accepts its dependencies after construction.
///
/// A type can implement several `Initializable` variants; the injector
/// invokes the first one (in reverse declaration order) whose arguments
/// all resolve, and only once per container lifetime.
pub trait Initializable<A: ArgList>: Send + Sync {
    fn init(&self, args: A);
}

impl ArgList for () {
    const ARITY: usize = 0;

    fn keys() -> ArgKeys {
        SmallVec::new()
    }

    fn from_instances(args: &[Instance]) -> Option<Self> {
        args.is_empty().then_some(())
    }
}

macro_rules! impl_arg_list {
    ($arity:expr; $($name:ident : $idx:tt),+) => {
        impl<$($name: ?Sized + Send + Sync + 'static),+> ArgList for ($(Arc<$name>,)+) {
            const ARITY: usize = $arity;

            fn keys() -> ArgKeys {
                smallvec![$(key_of::<$name>()),+]
            }

            fn from_instances(args: &[Instance]) -> Option<Self> {
                if args.len() != $arity {
                    return None;
                }
                Some(($(args[$idx].downcast::<$name>()?,)+))
            }
        }
    };
}

impl_arg_list!(1; A: 0);
impl_arg_list!(2; A: 0, B: 1);
impl_arg_list!(3; A: 0, B: 1, C: 2);
impl_arg_list!(4; A: 0, B: 1, C: 2, D: 3);
impl_arg_list!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
impl_arg_list!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
