//! Constant inlining: delegation to an external resolver and the widening
//! fallback when no precise answer is available

mod common;

use cascade::graph::{ConstantAffection, Propagation};
use cascade::model::{Access, UsageRecord};
use common::assertions::{affected, files};
use common::fixtures::{FixedResolver, Project, ResolverCall, Sources, SpawningResolver};
use std::path::PathBuf;

/// Project with a constant holder `p/K` in K.java and users around it
fn constant_project(access: Access) -> Project {
    let project = Project::in_memory();
    let k = project.id("p/K");
    project.build(vec![
        ("K.java", vec![project.plain_class("p/K").with_field(project.constant("LIMIT", access, 1))]),
        ("User.java", vec![project.plain_class("p/User").with_usage(UsageRecord::class(k))]),
        ("Other.java", vec![project.plain_class("p/Other")]),
        ("q/Outside.java", vec![project.plain_class("q/Outside")]),
    ]);
    project
}

fn bump_limit(project: &Project, access: Access) -> Sources {
    vec![(
        "K.java",
        vec![project.plain_class("p/K").with_field(project.constant("LIMIT", access, 2))],
    )]
}

#[test]
fn e2e_known_answer_is_used_verbatim() {
    let project = constant_project(Access::PUBLIC);
    let resolver = FixedResolver::answering(ConstantAffection::Known(files(&["User.java"])));

    let (_delta, propagation) = project.round_with(bump_limit(&project, Access::PUBLIC), &[], Some(&resolver));

    assert_eq!(affected(&propagation), files(&["User.java"]));
    assert_eq!(
        resolver.calls.lock().unwrap().as_slice(),
        &[ResolverCall {
            owner: "p.K".to_string(),
            field: "LIMIT".to_string(),
            is_removed: false,
            access_changed: false,
        }]
    );
}

#[test]
fn e2e_removed_constant_is_reported_as_removed() {
    let project = constant_project(Access::PUBLIC);
    let resolver = FixedResolver::answering(ConstantAffection::Known(files(&["User.java"])));

    let (_delta, propagation) =
        project.round_with(vec![("K.java", vec![project.plain_class("p/K")])], &[], Some(&resolver));

    assert!(affected(&propagation).contains(&PathBuf::from("User.java")));
    let calls = resolver.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].is_removed);
}

#[test]
fn e2e_unknown_answer_for_public_constant_forces_rebuild() {
    let project = constant_project(Access::PUBLIC);
    let resolver = FixedResolver::answering(ConstantAffection::Unknown);

    let (_delta, propagation) = project.round_with(bump_limit(&project, Access::PUBLIC), &[], Some(&resolver));
    assert_eq!(propagation, Propagation::FullRebuildRequired);
}

#[test]
fn e2e_dropped_request_counts_as_unknown() {
    let project = constant_project(Access::PUBLIC);
    let resolver = FixedResolver::failing();

    let (_delta, propagation) = project.round_with(bump_limit(&project, Access::PUBLIC), &[], Some(&resolver));
    assert_eq!(propagation, Propagation::FullRebuildRequired);
}

#[test]
fn e2e_package_constant_widens_to_its_package() {
    let project = constant_project(Access::empty());

    let (_delta, propagation) = project.round(bump_limit(&project, Access::empty()), &[]);
    let widened = affected(&propagation);

    assert!(widened.contains(&PathBuf::from("User.java")));
    assert!(widened.contains(&PathBuf::from("Other.java")));
    assert!(!widened.contains(&PathBuf::from("q/Outside.java")));
}

#[test]
fn e2e_protected_constant_widens_to_inheriting_subclasses() {
    let project = Project::in_memory();
    let limit = |value| project.constant("LIMIT", Access::PROTECTED, value);
    project.build(vec![
        ("K.java", vec![project.plain_class("p/K").with_field(limit(1))]),
        ("Other.java", vec![project.plain_class("p/Other")]),
        ("q/Sub.java", vec![project.class("q/Sub", "p/K")]),
        ("q/SubSub.java", vec![project.class("q/SubSub", "q/Sub")]),
        ("q/Shadow.java", vec![project.class("q/Shadow", "p/K").with_field(limit(7))]),
        ("q/Outside.java", vec![project.plain_class("q/Outside")]),
    ]);

    let (_delta, propagation) = project.round(vec![("K.java", vec![project.plain_class("p/K").with_field(limit(2))])], &[]);

    assert_eq!(
        affected(&propagation),
        files(&["K.java", "Other.java", "q/Sub.java", "q/SubSub.java"])
    );
}

#[test]
fn e2e_widening_never_reports_less_than_precise_answer() {
    let precise = {
        let project = constant_project(Access::empty());
        let resolver = FixedResolver::answering(ConstantAffection::Known(files(&["User.java"])));
        let (_delta, propagation) = project.round_with(bump_limit(&project, Access::empty()), &[], Some(&resolver));
        affected(&propagation)
    };
    let widened = {
        let project = constant_project(Access::empty());
        let (_delta, propagation) = project.round(bump_limit(&project, Access::empty()), &[]);
        affected(&propagation)
    };

    assert!(precise.is_subset(&widened), "{precise:?} not within {widened:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn e2e_answer_is_awaited_inside_multi_thread_runtime() {
    let project = constant_project(Access::PUBLIC);
    let resolver = SpawningResolver::answering(ConstantAffection::Known(files(&["User.java"])));

    let (_delta, propagation) = project.round_with(bump_limit(&project, Access::PUBLIC), &[], Some(&resolver));
    assert_eq!(affected(&propagation), files(&["User.java"]));
}

#[tokio::test]
async fn e2e_ready_answer_is_used_inside_current_thread_runtime() {
    let project = constant_project(Access::PUBLIC);
    let resolver = FixedResolver::answering(ConstantAffection::Known(files(&["User.java"])));

    let (_delta, propagation) = project.round_with(bump_limit(&project, Access::PUBLIC), &[], Some(&resolver));
    assert_eq!(affected(&propagation), files(&["User.java"]));
}

#[tokio::test]
async fn e2e_pending_answer_inside_current_thread_runtime_widens() {
    let project = constant_project(Access::empty());
    // the answering task cannot run while the round holds the only thread
    let resolver = SpawningResolver::answering(ConstantAffection::Known(files(&["User.java"])));

    let (_delta, propagation) = project.round_with(bump_limit(&project, Access::empty()), &[], Some(&resolver));
    let widened = affected(&propagation);

    assert!(widened.contains(&PathBuf::from("Other.java")));
    assert!(!widened.contains(&PathBuf::from("q/Outside.java")));
}
