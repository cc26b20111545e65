//! Shallow merging of partial updates into store state
//!
//! A store's state is a record; an update is a *patch* naming only the
//! fields that change. Merging overwrites exactly those fields and keeps
//! everything else. Nested values are replaced whole, never merged.
//!
//! Records get their patch type from [`store_state!`](crate::store_state):
//!
//! ```
//! fastctx::store_state! {
//!     #[derive(Clone, Debug, PartialEq)]
//!     pub struct Form => FormPatch {
//!         pub first: String,
//!         pub last: String,
//!     }
//! }
//!
//! use fastctx::ShallowMerge;
//!
//! let mut form = Form { first: "Ada".into(), last: "Byron".into() };
//! form.merge(FormPatch::default().last("Lovelace"));
//! assert_eq!(form, Form { first: "Ada".into(), last: "Lovelace".into() });
//! ```

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

/// State that accepts partial updates
pub trait ShallowMerge {
    /// Partial update: the subset of fields to overwrite
    type Patch;

    /// Overwrite the fields present in `patch`, keep the rest
    fn merge(&mut self, patch: Self::Patch);
}

/// Maps merge key by key: patch entries win, other entries are kept
impl<K, V, H> ShallowMerge for HashMap<K, V, H>
where
    K: Eq + Hash,
    H: BuildHasher,
{
    type Patch = HashMap<K, V, H>;

    fn merge(&mut self, patch: Self::Patch) {
        self.extend(patch);
    }
}

impl<K: Ord, V> ShallowMerge for BTreeMap<K, V> {
    type Patch = BTreeMap<K, V>;

    fn merge(&mut self, patch: Self::Patch) {
        self.extend(patch);
    }
}

/// Declare a store state record together with its patch type
///
/// Generates the record as written, a patch struct whose fields are the
/// record's fields wrapped in `Option`, a builder method per field on the
/// patch, and the [`ShallowMerge`] impl connecting the two.
///
/// ```
/// fastctx::store_state! {
///     #[derive(Clone, Debug, Default, PartialEq)]
///     pub struct Counter => CounterPatch {
///         pub count: i32,
///         pub label: String,
///     }
/// }
///
/// let patch = CounterPatch::default().count(3);
/// assert_eq!(patch.count, Some(3));
/// assert!(patch.label.is_none());
/// ```
#[macro_export]
macro_rules! store_state {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident => $patch:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        #[doc = concat!("Partial update for [`", stringify!($name), "`]")]
        #[derive(Clone, Default)]
        $vis struct $patch {
            $(
                $field_vis $field: ::core::option::Option<$ty>,
            )*
        }

        impl $patch {
            $(
                #[doc = concat!("Overwrite `", stringify!($field), "`")]
                #[must_use]
                pub fn $field(mut self, value: impl ::core::convert::Into<$ty>) -> Self {
                    self.$field = ::core::option::Option::Some(value.into());
                    self
                }
            )*
        }

        impl $crate::ShallowMerge for $name {
            type Patch = $patch;

            fn merge(&mut self, patch: $patch) {
                $(
                    if let ::core::option::Option::Some(value) = patch.$field {
                        self.$field = value;
                    }
                )*
            }
        }
    };
}
