//! Shared fixtures for the planning scenarios.
//!
//! Three groups of sources and three devices with different decryption
//! abilities, mirroring a small installation with one free-to-air and two
//! pay-TV capable receivers.

#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use recording_scheduler::{
    Device, RecordingDefinition, ResourceRef, ScheduleInformation, Source, SourceGroupId,
};
use uuid::Uuid;

pub fn group1() -> SourceGroupId {
    SourceGroupId(Uuid::from_u128(0x1001))
}

pub fn group2() -> SourceGroupId {
    SourceGroupId(Uuid::from_u128(0x1002))
}

pub fn group3() -> SourceGroupId {
    SourceGroupId(Uuid::from_u128(0x1003))
}

pub fn s1g1_free() -> Source {
    Source::new("S1", group1())
}

/// Same identity as [`s1g1_free`], flagged as encrypted.
pub fn s1g1_pay() -> Source {
    Source::encrypted("S1", group1())
}

pub fn s2g1_free() -> Source {
    Source::new("S2", group1())
}

pub fn s3g1_free() -> Source {
    Source::new("S3", group1())
}

pub fn s4g1_pay() -> Source {
    Source::encrypted("S4", group1())
}

pub fn s5g1_pay() -> Source {
    Source::encrypted("S5", group1())
}

pub fn s1g2_free() -> Source {
    Source::new("S1", group2())
}

pub fn s2g2_free() -> Source {
    Source::new("S2", group2())
}

pub fn s3g2_free() -> Source {
    Source::new("S3", group2())
}

pub fn s4g2_pay() -> Source {
    Source::encrypted("S4", group2())
}

pub fn s1g3_free() -> Source {
    Source::new("S1", group3())
}

/// A free source in a group of its own.
pub fn lone_source(name: &str) -> Source {
    Source::new(name, SourceGroupId::new())
}

fn common_sources() -> Vec<Source> {
    vec![
        s1g1_free(),
        s2g1_free(),
        s3g1_free(),
        s4g1_pay(),
        s1g2_free(),
        s2g2_free(),
        s3g2_free(),
        s4g2_pay(),
    ]
}

/// Receives everything but `S5` of group 1, cannot decrypt.
pub fn dev1() -> Device {
    Device::new("dev1")
        .with_sources(&common_sources())
        .with_source(s1g3_free())
        .with_decryption_limit(0)
}

/// Receives every source, decrypts one at a time.
pub fn dev2() -> Device {
    Device::new("dev2")
        .with_sources(&common_sources())
        .with_source(s5g1_pay())
        .with_source(s1g3_free())
        .with_decryption_limit(1)
}

/// Like [`dev2`] but without `S5` of group 1 and without group 3.
pub fn dev3() -> Device {
    Device::new("dev3")
        .with_sources(&common_sources())
        .with_decryption_limit(1)
}

/// A device receiving exactly `sources`.
pub fn device(name: &str, sources: &[&Source], priority: i32) -> ResourceRef {
    Device::new(name)
        .with_sources(sources.iter().copied())
        .with_priority(priority)
        .into_ref()
}

pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .expect("valid fixture time")
}

pub fn minutes(count: i64) -> TimeDelta {
    TimeDelta::minutes(count)
}

pub fn hours(count: i64) -> TimeDelta {
    TimeDelta::hours(count)
}

/// A single recording on any resource.
pub fn once(name: &str, source: Source, start: DateTime<Utc>, duration: TimeDelta) -> RecordingDefinition {
    RecordingDefinition::builder()
        .id(Uuid::new_v4())
        .name(name)
        .source(source)
        .start(start)
        .duration(duration)
        .build()
        .expect("valid recording fixture")
}

/// A single recording bound to `resources`.
pub fn bound(
    name: &str,
    resources: &[&ResourceRef],
    source: Source,
    start: DateTime<Utc>,
    duration: TimeDelta,
) -> RecordingDefinition {
    RecordingDefinition::builder()
        .id(Uuid::new_v4())
        .name(name)
        .resources(resources.iter().map(|r| (*r).clone()))
        .source(source)
        .start(start)
        .duration(duration)
        .build()
        .expect("valid recording fixture")
}

pub fn resource_names(schedules: &[ScheduleInformation]) -> Vec<Option<&str>> {
    schedules.iter().map(|s| s.resource_name()).collect()
}

pub fn names(schedules: &[ScheduleInformation]) -> Vec<&str> {
    schedules.iter().map(|s| s.definition.name()).collect()
}

pub fn late_flags(schedules: &[ScheduleInformation]) -> Vec<bool> {
    schedules.iter().map(|s| s.starts_late).collect()
}
