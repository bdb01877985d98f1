//! Built-in OME types and their typed views.
//!
//! Fields are stored as attributes named after the field, ID-references in an attribute named
//! after the relation, and containment lists as nested elements. A light source lists the lasers
//! pumped by it through the `LaserListByPump` referral, an image lists its logical channels
//! through `LogicalChannelList`, and so on: every referral names the source type and the
//! attribute that points back.

use crate::{
    schema::TypeDef,
    value::ScalarKind::{Boolean, Double, Float, Integer, Long, String as Text},
};

/// The OME type table, supertypes first.
pub fn schema() -> Vec<TypeDef> {
    vec![
        TypeDef::new("OME")
            .children("ExperimenterList", "Experimenter")
            .children("GroupList", "Group")
            .children("InstrumentList", "Instrument")
            .children("ImageList", "Image")
            .children("OriginalFileList", "OriginalFile"),
        TypeDef::new("Experimenter")
            .field("FirstName", Text)
            .field("LastName", Text)
            .field("Email", Text)
            .field("Institution", Text)
            .field("UserName", Text)
            .reference("Group", "Group")
            .referral("ImageList", "Image", "Experimenter"),
        TypeDef::new("Group")
            .field("Name", Text)
            .field("Description", Text)
            .reference("Leader", "Experimenter")
            .reference("Contact", "Experimenter")
            .referral("ExperimenterList", "Experimenter", "Group")
            .referral("ImageList", "Image", "Group"),
        TypeDef::new("Instrument")
            .field("Manufacturer", Text)
            .field("Model", Text)
            .field("SerialNumber", Text)
            .field("Type", Text)
            .children("LightSourceList", "LightSource")
            .children("ObjectiveList", "Objective")
            .children("FilterList", "Filter")
            .children("DichroicList", "Dichroic")
            .referral("ImageList", "Image", "Instrument"),
        TypeDef::new("Objective")
            .field("Manufacturer", Text)
            .field("Model", Text)
            .field("SerialNumber", Text)
            .field("NominalMagnification", Integer)
            .field("LensNA", Double)
            .field("Iris", Boolean)
            .field("WorkingDistance", Double)
            .reference("Instrument", "Instrument"),
        TypeDef::new("LightSource")
            .field("Manufacturer", Text)
            .field("Model", Text)
            .field("SerialNumber", Text)
            .field("Power", Float)
            .reference("Instrument", "Instrument")
            .referral("LaserListByPump", "Laser", "Pump")
            .referral("LogicalChannelList", "LogicalChannel", "LightSource"),
        TypeDef::new("Laser")
            .extends("LightSource")
            .field("Type", Text)
            .field("LaserMedium", Text)
            .field("Wavelength", Integer)
            .field("FrequencyDoubled", Boolean)
            .field("Tuneable", Boolean)
            .field("Pulse", Text)
            .reference("Pump", "LightSource"),
        TypeDef::new("Arc").extends("LightSource").field("Type", Text),
        TypeDef::new("Filament")
            .extends("LightSource")
            .field("Type", Text),
        TypeDef::new("Filter")
            .field("Manufacturer", Text)
            .field("Model", Text)
            .field("LotNumber", Text)
            .field("Type", Text)
            .field("FilterWheel", Text)
            .reference("Instrument", "Instrument")
            .referral("DichroicList", "Dichroic", "Filter"),
        TypeDef::new("Dichroic")
            .field("Manufacturer", Text)
            .field("Model", Text)
            .field("LotNumber", Text)
            .reference("Instrument", "Instrument")
            .reference("Filter", "Filter"),
        TypeDef::new("Image")
            .field("Name", Text)
            .field("Description", Text)
            .field("CreationDate", Text)
            .reference("Instrument", "Instrument")
            .reference("Experimenter", "Experimenter")
            .reference("Group", "Group")
            .referral("LogicalChannelList", "LogicalChannel", "Image")
            .referral("PixelsList", "Pixels", "Image"),
        TypeDef::new("LogicalChannel")
            .field("Name", Text)
            .field("SamplesPerPixel", Integer)
            .field("ExWave", Integer)
            .field("EmWave", Integer)
            .field("Fluor", Text)
            .field("Mode", Text)
            .reference("Image", "Image")
            .reference("LightSource", "LightSource"),
        TypeDef::new("Pixels")
            .field("SizeX", Integer)
            .field("SizeY", Integer)
            .field("SizeZ", Integer)
            .field("SizeC", Integer)
            .field("SizeT", Integer)
            .field("PixelType", Text)
            .field("DimensionOrder", Text)
            .field("BigEndian", Boolean)
            .reference("Image", "Image")
            .referral("PlaneStatisticsList", "PlaneStatistics", "Pixels"),
        TypeDef::new("PlaneStatistics")
            .field("TheZ", Integer)
            .field("TheC", Integer)
            .field("TheT", Integer)
            .field("Mean", Double)
            .field("Minimum", Double)
            .field("Maximum", Double)
            .reference("Pixels", "Pixels"),
        TypeDef::new("OriginalFile")
            .field("SHA1", Text)
            .field("Path", Text)
            .field("FileSize", Long)
            .field("Format", Text),
    ]
}

crate::entity! {
    /// Document root.
    pub struct Ome = "OME" {
        list experimenters, count_experimenters, create_experimenter: Experimenter = "ExperimenterList";
        list groups, count_groups, create_group: Group = "GroupList";
        list instruments, count_instruments, create_instrument: Instrument = "InstrumentList";
        list images, count_images, create_image: Image = "ImageList";
        list original_files, count_original_files, create_original_file: OriginalFile = "OriginalFileList";
    }
}

crate::entity! {
    pub struct Experimenter = "Experimenter" {
        field first_name, set_first_name: String = "FirstName";
        field last_name, set_last_name: String = "LastName";
        field email, set_email: String = "Email";
        field institution, set_institution: String = "Institution";
        field user_name, set_user_name: String = "UserName";
        relation group, set_group: Group = "Group";
        list images, count_images: Image = "ImageList";
    }
}

crate::entity! {
    pub struct Group = "Group" {
        field name, set_name: String = "Name";
        field description, set_description: String = "Description";
        relation leader, set_leader: Experimenter = "Leader";
        relation contact, set_contact: Experimenter = "Contact";
        list experimenters, count_experimenters: Experimenter = "ExperimenterList";
        list images, count_images: Image = "ImageList";
    }
}

crate::entity! {
    pub struct Instrument = "Instrument" {
        field manufacturer, set_manufacturer: String = "Manufacturer";
        field model, set_model: String = "Model";
        field serial_number, set_serial_number: String = "SerialNumber";
        list light_sources, count_light_sources, create_light_source: LightSource = "LightSourceList";
        list objectives, count_objectives, create_objective: Objective = "ObjectiveList";
        list filters, count_filters, create_filter: Filter = "FilterList";
        list dichroics, count_dichroics, create_dichroic: Dichroic = "DichroicList";
        list images, count_images: Image = "ImageList";
    }
}

crate::entity! {
    pub struct Objective = "Objective" {
        field manufacturer, set_manufacturer: String = "Manufacturer";
        field model, set_model: String = "Model";
        field nominal_magnification, set_nominal_magnification: i32 = "NominalMagnification";
        field lens_na, set_lens_na: f64 = "LensNA";
        field iris, set_iris: bool = "Iris";
        field working_distance, set_working_distance: f64 = "WorkingDistance";
        relation instrument, set_instrument: Instrument = "Instrument";
    }
}

crate::entity! {
    /// Any light source. Lasers, arcs and filaments are light sources too.
    pub struct LightSource = "LightSource" {
        field manufacturer, set_manufacturer: String = "Manufacturer";
        field model, set_model: String = "Model";
        field serial_number, set_serial_number: String = "SerialNumber";
        field power, set_power: f32 = "Power";
        relation instrument, set_instrument: Instrument = "Instrument";
        list lasers_pumped, count_lasers_pumped: Laser = "LaserListByPump";
        list logical_channels, count_logical_channels: LogicalChannel = "LogicalChannelList";
    }
}

crate::entity! {
    pub struct Laser = "Laser" {
        field laser_type, set_laser_type: String = "Type";
        field laser_medium, set_laser_medium: String = "LaserMedium";
        field wavelength, set_wavelength: i32 = "Wavelength";
        field frequency_doubled, set_frequency_doubled: bool = "FrequencyDoubled";
        field tuneable, set_tuneable: bool = "Tuneable";
        field pulse, set_pulse: String = "Pulse";
        relation pump, set_pump: LightSource = "Pump";
    }
}

crate::entity! {
    pub struct Arc = "Arc" {
        field arc_type, set_arc_type: String = "Type";
    }
}

crate::entity! {
    pub struct Filament = "Filament" {
        field filament_type, set_filament_type: String = "Type";
    }
}

crate::entity! {
    pub struct Filter = "Filter" {
        field manufacturer, set_manufacturer: String = "Manufacturer";
        field model, set_model: String = "Model";
        field lot_number, set_lot_number: String = "LotNumber";
        field filter_type, set_filter_type: String = "Type";
        field filter_wheel, set_filter_wheel: String = "FilterWheel";
        relation instrument, set_instrument: Instrument = "Instrument";
        list dichroics, count_dichroics, create_dichroic: Dichroic = "DichroicList";
    }
}

crate::entity! {
    pub struct Dichroic = "Dichroic" {
        field manufacturer, set_manufacturer: String = "Manufacturer";
        field model, set_model: String = "Model";
        field lot_number, set_lot_number: String = "LotNumber";
        relation instrument, set_instrument: Instrument = "Instrument";
        relation filter, set_filter: Filter = "Filter";
    }
}

crate::entity! {
    pub struct Image = "Image" {
        field name, set_name: String = "Name";
        field description, set_description: String = "Description";
        field creation_date, set_creation_date: String = "CreationDate";
        relation instrument, set_instrument: Instrument = "Instrument";
        relation experimenter, set_experimenter: Experimenter = "Experimenter";
        relation group, set_group: Group = "Group";
        list logical_channels, count_logical_channels: LogicalChannel = "LogicalChannelList";
        list pixels, count_pixels: Pixels = "PixelsList";
    }
}

crate::entity! {
    pub struct LogicalChannel = "LogicalChannel" {
        field name, set_name: String = "Name";
        field samples_per_pixel, set_samples_per_pixel: i32 = "SamplesPerPixel";
        field ex_wave, set_ex_wave: i32 = "ExWave";
        field em_wave, set_em_wave: i32 = "EmWave";
        field fluor, set_fluor: String = "Fluor";
        field mode, set_mode: String = "Mode";
        relation image, set_image: Image = "Image";
        relation light_source, set_light_source: LightSource = "LightSource";
    }
}

crate::entity! {
    pub struct Pixels = "Pixels" {
        field size_x, set_size_x: i32 = "SizeX";
        field size_y, set_size_y: i32 = "SizeY";
        field size_z, set_size_z: i32 = "SizeZ";
        field size_c, set_size_c: i32 = "SizeC";
        field size_t, set_size_t: i32 = "SizeT";
        field pixel_type, set_pixel_type: String = "PixelType";
        field dimension_order, set_dimension_order: String = "DimensionOrder";
        field big_endian, set_big_endian: bool = "BigEndian";
        relation image, set_image: Image = "Image";
        list plane_statistics, count_plane_statistics: PlaneStatistics = "PlaneStatisticsList";
    }
}

crate::entity! {
    pub struct PlaneStatistics = "PlaneStatistics" {
        field the_z, set_the_z: i32 = "TheZ";
        field the_c, set_the_c: i32 = "TheC";
        field the_t, set_the_t: i32 = "TheT";
        field mean, set_mean: f64 = "Mean";
        field minimum, set_minimum: f64 = "Minimum";
        field maximum, set_maximum: f64 = "Maximum";
        relation pixels, set_pixels: Pixels = "Pixels";
    }
}

crate::entity! {
    pub struct OriginalFile = "OriginalFile" {
        field sha1, set_sha1: String = "SHA1";
        field path, set_path: String = "Path";
        field file_size, set_file_size: i64 = "FileSize";
        field format, set_format: String = "Format";
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{entity::Entity, registry::TypeRegistry};

    #[test]
    fn test_schema_is_consistent() {
        let types = TypeRegistry::ome();
        for def in schema() {
            if let Some(parent) = &def.extends {
                assert!(types.contains(parent), "{} extends unknown {}", def.name, parent);
            }
            for relation in &def.relations {
                assert!(
                    types.contains(&relation.target),
                    "{}.{} targets unknown {}",
                    def.name,
                    relation.name,
                    relation.target
                );
            }
        }
    }

    #[test]
    fn test_views_name_registered_types() {
        let types = TypeRegistry::ome();
        for name in [
            Ome::TYPE_NAME,
            Experimenter::TYPE_NAME,
            Group::TYPE_NAME,
            Instrument::TYPE_NAME,
            Objective::TYPE_NAME,
            LightSource::TYPE_NAME,
            Laser::TYPE_NAME,
            Arc::TYPE_NAME,
            Filament::TYPE_NAME,
            Filter::TYPE_NAME,
            Dichroic::TYPE_NAME,
            Image::TYPE_NAME,
            LogicalChannel::TYPE_NAME,
            Pixels::TYPE_NAME,
            PlaneStatistics::TYPE_NAME,
            OriginalFile::TYPE_NAME,
        ] {
            assert!(types.contains(name), "{name} is not registered");
        }
        assert_eq!(types.list_types().len(), schema().len());
    }

    #[test]
    fn test_laser_inherits_light_source() {
        let types = TypeRegistry::ome();
        assert!(types.is_a("Laser", "LightSource"));
        assert!(types.relation("Laser", "LaserListByPump").is_ok());
        assert_eq!(
            types.field("Laser", "Power").unwrap().kind,
            crate::value::ScalarKind::Float
        );
    }
}
