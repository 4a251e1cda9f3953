//! Running allocations and the activity loop built on top of them.

mod common;

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc, Weekday};
use common::*;
use recording_scheduler::{
    AllocationManager, DecryptionGroup, Error, RecordingDefinition, RecordingScheduler,
    ResourceActivity, ResourceRef, ScheduleInformation, SchedulerConfig, SharedAllocationManager,
};
use rstest::{fixture, rstest};
use uuid::Uuid;

fn now() -> DateTime<Utc> {
    // A Monday.
    utc(2024, 6, 3, 12, 0, 0)
}

struct Setup {
    manager: AllocationManager,
    dev1: ResourceRef,
    dev2: ResourceRef,
}

#[fixture]
fn setup() -> Setup {
    let dev1 = dev1().into_ref();
    let dev2 = dev2().into_ref();
    let mut manager = AllocationManager::new(SchedulerConfig::default());
    manager.add_resource(dev1.clone()).expect("registers");
    manager.add_resource(dev2.clone()).expect("registers");
    Setup { manager, dev1, dev2 }
}

type Loaded = recording_scheduler::Result<Vec<ScheduleInformation>>;

/// A loader adding `definitions` to whatever scheduler it is handed.
fn loader(definitions: Vec<Arc<RecordingDefinition>>) -> impl Fn(RecordingScheduler, DateTime<Utc>) -> Loaded {
    move |mut scheduler, reference| {
        for definition in &definitions {
            scheduler.add_recording(Arc::clone(definition))?;
        }
        Ok(scheduler.schedules(reference).collect())
    }
}

fn weekly_on_monday(start: DateTime<Utc>) -> Arc<RecordingDefinition> {
    Arc::new(
        RecordingDefinition::builder()
            .name("weekly")
            .resource(dev1().into_ref())
            .source(s1g1_free())
            .start(start)
            .duration(minutes(100))
            .repeat(NaiveDate::from_ymd_opt(2100, 12, 31).expect("valid date"), [Weekday::Mon])
            .build()
            .expect("valid definition"),
    )
}

mod registration_tests {
    use super::*;

    #[rstest]
    fn test_each_resource_once(setup: Setup) {
        let mut manager = setup.manager;
        assert!(matches!(
            manager.add_resource(dev1().into_ref()),
            Err(Error::Duplicate { .. })
        ));
        assert_eq!(manager.resources().len(), 2);
    }

    #[rstest]
    fn test_resources_fixed_while_allocated(setup: Setup) {
        let mut manager = setup.manager;
        assert!(
            manager
                .start(&setup.dev1, Some(s1g1_free()), Uuid::new_v4(), "test", now(), now() + minutes(10))
                .expect("valid request")
        );

        let err = manager.add_resource(dev3().into_ref()).unwrap_err();
        assert!(matches!(err, Error::Inconsistent(_)));
        assert!(
            manager
                .add_decryption_group(DecryptionGroup::new("card", 1).with_resource(setup.dev2.clone()))
                .is_err()
        );
    }
}

mod allocation_tests {
    use super::*;

    #[rstest]
    fn test_recording_time_must_be_positive(setup: Setup) {
        let mut manager = setup.manager;
        let err = manager
            .start(&setup.dev1, Some(s1g1_free()), Uuid::new_v4(), "test", now(), now())
            .unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }));
    }

    #[test]
    fn test_start_requires_known_resource() {
        let mut manager = AllocationManager::default();
        let err = manager
            .start(&dev1().into_ref(), Some(s1g1_free()), Uuid::new_v4(), "test", now(), now() + hours(1))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[rstest]
    fn test_source_must_be_receivable(setup: Setup) {
        let mut manager = setup.manager;
        let end = now() + hours(1);
        assert!(!manager.start(&setup.dev1, Some(s5g1_pay()), Uuid::new_v4(), "pay", now(), end).unwrap());
        assert!(!manager.start(&setup.dev1, Some(lone_source("x")), Uuid::new_v4(), "x", now(), end).unwrap());
        assert!(manager.current_allocations().is_empty());
    }

    #[rstest]
    fn test_single_allocation_is_reported(setup: Setup) {
        let mut manager = setup.manager;
        let id = Uuid::new_v4();
        let end = now() + minutes(23);
        assert!(manager.start(&setup.dev1, Some(s1g1_free()), id, "test1", now(), end).unwrap());

        let allocations = manager.current_allocations();
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].resource.name(), "dev1");
        assert_eq!(allocations[0].name, "test1");
        assert_eq!(allocations[0].source, Some(s1g1_free()));
        assert_eq!(allocations[0].id, id);
        assert_eq!(allocations[0].time.start, now());
        assert_eq!(allocations[0].time.end, end);
        assert_eq!(manager.end_of_allocation(), Some(end));
    }

    #[rstest]
    #[case::same_group(s2g1_free(), true)]
    #[case::other_group(s1g2_free(), false)]
    fn test_second_source_on_busy_device(setup: Setup, #[case] second: recording_scheduler::Source, #[case] accepted: bool) {
        let mut manager = setup.manager;
        assert!(
            manager
                .start(&setup.dev1, Some(s1g1_free()), Uuid::new_v4(), "test1", now(), now() + minutes(23))
                .unwrap()
        );
        let started = manager
            .start(&setup.dev1, Some(second), Uuid::new_v4(), "test2", now() + minutes(7), now() + minutes(127))
            .unwrap();

        assert_eq!(started, accepted);
        assert_eq!(manager.current_allocations().len(), if accepted { 2 } else { 1 });
        assert_eq!(manager.current_allocations()[0].name, "test1");
    }

    #[rstest]
    #[case::recording_then_task(Some(s1g1_free()), None)]
    #[case::task_then_recording(None, Some(s1g1_free()))]
    #[case::two_tasks(None, None)]
    fn test_task_needs_exclusive_device(
        setup: Setup,
        #[case] first: Option<recording_scheduler::Source>,
        #[case] second: Option<recording_scheduler::Source>,
    ) {
        let mut manager = setup.manager;
        let first_is_task = first.is_none();
        assert!(
            manager
                .start(&setup.dev1, first, Uuid::new_v4(), "first", now() + minutes(7), now() + minutes(30))
                .unwrap()
        );
        // Even a recording starting before the task and lasting past it is refused.
        assert!(
            !manager
                .start(&setup.dev1, second, Uuid::new_v4(), "second", now(), now() + minutes(120))
                .unwrap()
        );

        let allocations = manager.current_allocations();
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].name, "first");
        assert_eq!(allocations[0].is_task(), first_is_task);
    }

    #[rstest]
    fn test_each_allocation_starts_once(setup: Setup) {
        let mut manager = setup.manager;
        let id = Uuid::new_v4();
        let end = now() + minutes(23);
        assert!(manager.start(&setup.dev1, Some(s1g1_free()), id, "test", now(), end).unwrap());

        let err = manager.start(&setup.dev1, Some(s1g1_free()), id, "test", now(), end).unwrap_err();
        assert!(matches!(err, Error::Duplicate { .. }));
    }

    #[rstest]
    fn test_stop(setup: Setup) {
        let mut manager = setup.manager;
        let (id1, id2) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(manager.start(&setup.dev1, Some(s1g1_free()), id1, "test1", now(), now() + minutes(23)).unwrap());
        assert!(
            manager
                .start(&setup.dev1, Some(s2g1_free()), id2, "test2", now() + minutes(7), now() + minutes(127))
                .unwrap()
        );

        manager.stop(id1).expect("running allocation stops");
        let allocations = manager.current_allocations();
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].name, "test2");

        assert!(matches!(manager.stop(id1), Err(Error::NotFound { .. })));
        manager.stop(id2).expect("remaining allocation stops");
        assert!(manager.current_allocations().is_empty());
    }

    #[rstest]
    fn test_modify(setup: Setup) {
        let mut manager = setup.manager;
        let id = Uuid::new_v4();
        assert!(manager.start(&setup.dev1, Some(s1g1_free()), id, "test1", now(), now() + minutes(23)).unwrap());

        assert!(manager.modify(id, now() + minutes(90)).unwrap());
        assert_eq!(manager.current_allocations()[0].time.end, now() + minutes(90));

        assert!(matches!(manager.modify(id, now()), Err(Error::OutOfRange { .. })));
        assert!(matches!(
            manager.modify(Uuid::new_v4(), now() + hours(1)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_modify_checks_decryption() {
        let pay = dev2().into_ref();
        let mut manager = AllocationManager::default();
        manager.add_resource(pay.clone()).expect("registers");

        let (id1, id2) = (Uuid::new_v4(), Uuid::new_v4());
        let handover = now() + minutes(23);
        assert!(manager.start(&pay, Some(s1g1_pay()), id1, "test1", now(), handover).unwrap());
        assert!(manager.start(&pay, Some(s4g1_pay()), id2, "test2", handover, handover + minutes(120)).unwrap());

        assert!(!manager.modify(id1, handover + TimeDelta::nanoseconds(100)).unwrap());
        let allocations = manager.current_allocations();
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0].time.end, handover);
        assert_eq!(allocations[1].source, Some(s4g1_pay()));
    }
}

mod planning_tests {
    use super::*;

    #[test]
    fn test_activity_loop_for_single_recording() {
        let mut manager = AllocationManager::default();
        manager.add_resource(dev1().into_ref()).expect("registers");
        let play = Arc::new(once("test", s1g1_free(), now() + minutes(10), minutes(100)));
        let load = loader(vec![Arc::clone(&play)]);

        let mut clock = now();
        let next = manager.next_activity(clock, &load).unwrap();
        let Some(ResourceActivity::Wait { retest_at }) = next else {
            panic!("expected to wait, got {next:?}");
        };
        assert_eq!(retest_at, now() + minutes(10));
        clock = retest_at;

        let next = manager.next_activity(clock, &load).unwrap();
        let Some(ResourceActivity::Start(plan)) = next else {
            panic!("expected a start, got {next:?}");
        };
        assert_eq!(plan.time.start, clock);
        assert_eq!(manager.end_of_allocation(), None);
        assert!(manager.start_schedule(&plan).unwrap());
        assert_eq!(manager.end_of_allocation(), Some(plan.time.end));

        let next = manager.next_activity(clock, &load).unwrap();
        let Some(ResourceActivity::Wait { retest_at }) = next else {
            panic!("expected to wait, got {next:?}");
        };
        assert_eq!(retest_at, plan.time.end);
        clock = retest_at;

        let next = manager.next_activity(clock, &load).unwrap();
        let Some(ResourceActivity::Stop { id }) = next else {
            panic!("expected a stop, got {next:?}");
        };
        assert_eq!(id, play.id());

        manager.stop(id).unwrap();
        assert!(manager.next_activity(clock, &load).unwrap().is_none());
    }

    #[test]
    fn test_running_definition_is_not_planned_again() {
        let mut manager = AllocationManager::default();
        manager.add_resource(dev1().into_ref()).expect("registers");
        let play = weekly_on_monday(now() + minutes(10));

        let mut scheduler = manager.create_scheduler(true);
        scheduler.add_recording(Arc::clone(&play)).unwrap();
        let plan: Vec<_> = scheduler.schedules(now()).take(100).collect();
        assert_eq!(plan.len(), 100);
        assert_eq!(plan[0].time.start.weekday(), Weekday::Mon);
        assert_eq!(manager.end_of_allocation(), None);

        assert!(manager.start_schedule(&plan[0]).unwrap());
        let mut scheduler = manager.create_scheduler(true);
        scheduler.add_recording(Arc::clone(&play)).unwrap();
        assert_eq!(scheduler.schedules(now()).count(), 0);
        assert_eq!(manager.end_of_allocation(), Some(plan[0].time.end));
    }

    #[rstest]
    #[case::unchanged(TimeDelta::zero())]
    #[case::extended(minutes(20))]
    #[case::cut(minutes(-20))]
    fn test_running_occurrence_hidden_from_plan(#[case] change: TimeDelta) {
        let mut manager = AllocationManager::default();
        manager.add_resource(dev1().into_ref()).expect("registers");
        let load = loader(vec![weekly_on_monday(now() + minutes(10))]);

        let initial: Vec<_> = manager.get_schedules(now(), &load).unwrap().take(2).collect();
        assert!(manager.start_schedule(&initial[0]).unwrap());
        if change != TimeDelta::zero() {
            assert!(manager.modify(initial[0].definition.id(), initial[0].time.end + change).unwrap());
        }

        let follower = manager
            .get_schedules(now(), &load)
            .unwrap()
            .next()
            .expect("next week is planned");
        assert_eq!(follower.time.start, initial[1].time.start);
    }

    #[test]
    fn test_recording_overlapping_running_task() {
        let device = dev1().into_ref();
        let mut manager = AllocationManager::default();
        manager.add_resource(device.clone()).expect("registers");
        let start = utc(2013, 12, 3, 17, 0, 0);
        assert!(manager.start(&device, None, Uuid::new_v4(), "EPG", start, start + minutes(20)).unwrap());

        let load = loader(vec![
            Arc::new(once("testA", s1g1_free(), start + minutes(1), minutes(120))),
            Arc::new(once("testB", s1g2_free(), start + hours(25), minutes(30))),
            Arc::new(once("testC", s1g3_free(), start + hours(26), minutes(30))),
        ]);

        let schedules: Vec<_> = manager.get_schedules(start, &load).unwrap().collect();
        assert_eq!(schedules.iter().filter(|s| s.is_scheduled()).count(), 3);
        // The first recording waits for the task to finish.
        assert_eq!(schedules[0].time.start, start + minutes(20));
        assert!(schedules[0].starts_late);
    }

    #[test]
    fn test_planning_after_recording_started() {
        let day = utc(2024, 6, 13, 0, 0, 0);
        let s1 = lone_source("s1");
        let s2 = lone_source("s2");
        let s3 = lone_source("s3");
        let dev1 = device("dev1", &[&s1, &s2, &s3], 0);
        let dev2 = device("dev2", &[&s1, &s2, &s3], 0);

        let mut manager = AllocationManager::default();
        manager.add_resource(dev1).expect("registers");
        manager.add_resource(dev2.clone()).expect("registers");

        let id1 = Uuid::new_v4();
        let start1 = day + hours(11) + minutes(40);
        assert!(manager.start(&dev2, Some(s1.clone()), id1, "test1", start1, start1 + minutes(15)).unwrap());

        let plan1 = RecordingDefinition::builder()
            .id(id1)
            .name("test1")
            .source(s1)
            .start(start1)
            .duration(minutes(15))
            .build()
            .unwrap();
        let mut scheduler = manager.create_scheduler(false);
        scheduler.add_recording(plan1).unwrap();
        scheduler
            .add_recording(once("test2", s2, day + hours(11) + minutes(45), minutes(15)))
            .unwrap();
        scheduler
            .add_recording(once("test3", s3, day + hours(11) + minutes(50), minutes(15)))
            .unwrap();

        let reference = start1 + minutes(5) + TimeDelta::nanoseconds(100);
        let schedules: Vec<_> = scheduler
            .schedules(reference)
            .filter(|s| s.definition.id() != id1)
            .collect();
        assert!(schedules.iter().all(ScheduleInformation::is_scheduled));
        // test3 keeps its start on the idle device, test2 follows the
        // running recording.
        assert_eq!(names(&schedules), ["test3", "test2"]);
        assert_eq!(resource_names(&schedules), [Some("dev1"), Some("dev2")]);
        assert_eq!(late_flags(&schedules), [false, true]);
        assert_eq!(schedules[1].time.start, start1 + minutes(15));
    }

    #[test]
    fn test_unschedulable_entry_does_not_block_start() {
        let mut manager = AllocationManager::default();
        manager.add_resource(dev1().into_ref()).expect("registers");
        let start = now() + minutes(10);
        let first = Arc::new(once("first", s1g1_free(), start, hours(1)));
        let clash = Arc::new(once("clash", s1g2_free(), start + minutes(30), minutes(30)));
        let load = loader(vec![Arc::clone(&first), Arc::clone(&clash)]);

        let next = manager.next_activity(start, &load).unwrap();
        let Some(ResourceActivity::Start(plan)) = next else {
            panic!("expected a start, got {next:?}");
        };
        assert_eq!(plan.definition.id(), first.id());
        assert_eq!(plan.time.start, start);
        assert!(manager.start_schedule(&plan).unwrap());

        let next = manager.next_activity(start + minutes(30), &load).unwrap();
        let Some(ResourceActivity::Wait { retest_at }) = next else {
            panic!("expected to wait, got {next:?}");
        };
        assert_eq!(retest_at, start + hours(1));

        let next = manager.next_activity(retest_at, &load).unwrap();
        assert!(matches!(next, Some(ResourceActivity::Stop { id }) if id == first.id()));
    }

    #[test]
    fn test_loader_errors_are_propagated() {
        let mut manager = AllocationManager::default();
        manager.add_resource(dev1().into_ref()).expect("registers");
        let twice = Arc::new(once("twice", s1g1_free(), now() + hours(1), minutes(10)));
        let load = loader(vec![Arc::clone(&twice), twice]);

        assert!(matches!(
            manager.next_activity(now(), &load),
            Err(Error::Duplicate { .. })
        ));
    }
}

mod shared_tests {
    use super::*;

    #[test]
    fn test_shared_manager_across_threads() {
        let device = dev1().into_ref();
        let mut manager = AllocationManager::default();
        manager.add_resource(device.clone()).expect("registers");
        let shared = SharedAllocationManager::new(manager);

        let sources = [s1g1_free(), s2g1_free(), s3g1_free()];
        std::thread::scope(|scope| {
            for source in &sources {
                let shared = shared.clone();
                let device = device.clone();
                scope.spawn(move || {
                    shared.with(|manager| {
                        manager
                            .start(&device, Some(source.clone()), Uuid::new_v4(), source.name(), now(), now() + hours(1))
                            .expect("valid request")
                    })
                });
            }
        });

        let allocations = shared.current_allocations();
        assert_eq!(allocations.len(), 3);
        assert!(allocations.iter().all(|a| a.resource.name() == "dev1"));

        let id = allocations[0].id;
        assert!(shared.modify(id, now() + hours(2)).unwrap());
        shared.stop(id).unwrap();
        assert_eq!(shared.current_allocations().len(), 2);

        let next = shared
            .next_activity(now() + hours(1), loader(Vec::new()))
            .unwrap();
        assert!(matches!(next, Some(ResourceActivity::Stop { .. })));
    }
}
