//! Typed views over records.
//!
//! Each schema type gets a newtype around [`Record`] implementing [`Entity`]. The [`entity!`]
//! macro writes those newtypes from a declaration listing the type's fields and relations:
//!
//! ```
//! use ome_model::entity;
//!
//! entity! {
//!     /// A person.
//!     pub struct Person = "Experimenter" {
//!         field first_name, set_first_name: String = "FirstName";
//!         relation group, set_group: Team = "Group";
//!     }
//! }
//!
//! entity! {
//!     pub struct Team = "Group" {
//!         list members, count_members: Person = "ExperimenterList";
//!     }
//! }
//! ```
//!
//! Getters return `Ok(None)` for never-set values, setters take `None` to clear a value, list
//! accessors come in pairs with a count that never builds records.

use crate::{document::Document, error::OmeError, record::Record};

pub trait Entity: Sized {
    /// The registered type this view wraps. Records of any subtype are accepted.
    const TYPE_NAME: &'static str;

    /// Wrap `record` without checking its type. Use [`Entity::from_record`] or
    /// [`Record::cast`] instead.
    fn from_record_unchecked(record: Record) -> Self;

    fn record(&self) -> &Record;

    fn from_record(record: Record) -> Result<Self, OmeError> {
        record.cast()
    }

    fn id(&self) -> Result<Option<String>, OmeError> {
        self.record().id()
    }

    fn set_id(&self, id: Option<&str>) -> Result<(), OmeError> {
        self.record().set_id(id)
    }

    fn document(&self) -> &Document {
        self.record().document()
    }

    /// Re-view the same record as another type it is-a, e.g. a laser as a light source.
    fn view<T: Entity>(&self) -> Result<T, OmeError> {
        self.record().cast()
    }
}

#[macro_export]
macro_rules! entity {
    (
        $(#[$meta:meta])*
        pub struct $name:ident = $type_name:literal {
            $(field $getter:ident, $setter:ident: $fty:ty = $fname:literal;)*
            $(relation $rel:ident $(, $link:ident)?: $target:ty = $rname:literal;)*
            $(list $list:ident, $count:ident $(, $create:ident)?: $item:ty = $lname:literal;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name($crate::record::Record);

        impl $crate::entity::Entity for $name {
            const TYPE_NAME: &'static str = $type_name;

            fn from_record_unchecked(record: $crate::record::Record) -> Self {
                $name(record)
            }

            fn record(&self) -> &$crate::record::Record {
                &self.0
            }
        }

        #[allow(dead_code)]
        impl $name {
            $(
                pub fn $getter(&self) -> Result<Option<$fty>, $crate::error::OmeError> {
                    self.0.get_as::<$fty>($fname)
                }

                pub fn $setter(&self, value: Option<$fty>) -> Result<(), $crate::error::OmeError> {
                    match value {
                        Some(value) => self.0.set_as::<$fty>($fname, value),
                        None => self.0.unset($fname),
                    }
                }
            )*
            $(
                pub fn $rel(&self) -> Result<Option<$target>, $crate::error::OmeError> {
                    self.0
                        .relation($rname)?
                        .map(|record| record.cast::<$target>())
                        .transpose()
                }

                $(
                    pub fn $link(&self, target: Option<&$target>) -> Result<(), $crate::error::OmeError> {
                        self.0.link(
                            $rname,
                            target.map(|t| $crate::entity::Entity::record(t)),
                        )
                    }
                )?
            )*
            $(
                pub fn $list(&self) -> Result<Vec<$item>, $crate::error::OmeError> {
                    self.0
                        .relation_list($lname)?
                        .into_iter()
                        .map(|record| record.cast::<$item>())
                        .collect()
                }

                pub fn $count(&self) -> Result<usize, $crate::error::OmeError> {
                    self.0.count_relation($lname)
                }

                $(
                    pub fn $create(&self) -> Result<$item, $crate::error::OmeError> {
                        self.0.create_child($lname)?.cast::<$item>()
                    }
                )?
            )*
        }
    };
}
