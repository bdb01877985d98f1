pub mod helpers;

use crate::{
    entity::Entity,
    ome::{Image, Laser, LightSource, Objective},
    store::Locus,
};
use helpers::*;

#[test]
fn test_memo_is_dropped_after_write() {
    let document = sample_document();
    let channel = by_id(&document, "LogicalChannel", "LogicalChannel:1");
    let first = channel.relation("LightSource").unwrap().unwrap();
    assert_eq!(first.id().unwrap().as_deref(), Some("LightSource:2"));

    channel.set("Name", "green").unwrap();
    let Locus::Element(el) = channel.locus() else {
        panic!("element expected");
    };
    document
        .with_dom_mut(|dom| dom.set_attribute(el, "LightSource", "LightSource:3"))
        .unwrap()
        .unwrap();
    let second = channel.relation("LightSource").unwrap().unwrap();
    assert_eq!(second.id().unwrap().as_deref(), Some("LightSource:3"));
    assert_eq!(second.type_name(), "Arc");
}

#[test]
fn test_index_is_shared_between_forward_and_reverse_queries() {
    let document = sample_document();
    let image = by_id(&document, "Image", "Image:1");
    let builds = document.referrals().builds();
    image.count_relation("LogicalChannelList").unwrap();
    image.relation_list("LogicalChannelList").unwrap();
    image.relation_at("LogicalChannelList", 1).unwrap();
    assert_eq!(document.referrals().builds(), builds + 1);

    let objective = by_id(&document, "Objective", "Objective:1");
    objective.relation("Instrument").unwrap();
    let laser = by_id(&document, "Laser", "LightSource:2");
    laser.relation("Instrument").unwrap();
    assert_eq!(document.referrals().builds(), builds + 2);
}

#[test]
fn test_appended_referral_source_is_seen() {
    let document = sample_document();
    let image = Image::from_record(by_id(&document, "Image", "Image:1")).unwrap();
    assert_eq!(image.count_logical_channels().unwrap(), 2);
    append(
        &document,
        image.record(),
        "LogicalChannel",
        &[("ID", "LogicalChannel:3"), ("Image", "Image:1")],
    );
    assert_eq!(image.count_logical_channels().unwrap(), 3);
    assert_eq!(image.logical_channels().unwrap().len(), 3);
}

#[test]
fn test_typed_views_over_sample() {
    let document = sample_document();
    let laser = Laser::from_record(by_id(&document, "Laser", "LightSource:2")).unwrap();
    assert_eq!(laser.wavelength().unwrap(), Some(488));
    assert_eq!(laser.frequency_doubled().unwrap(), Some(true));
    assert_eq!(laser.tuneable().unwrap(), None);

    let pump = laser.pump().unwrap().unwrap();
    assert_eq!(pump.power().unwrap(), Some(5.5));
    assert_eq!(pump.record().type_name(), "Laser");

    let objective = Objective::from_record(by_id(&document, "Objective", "Objective:1")).unwrap();
    assert_eq!(objective.lens_na().unwrap(), Some(1.42));
    assert_eq!(objective.iris().unwrap(), Some(false));
    assert!(objective.view::<LightSource>().is_err());
}
