//! Member and class-level propagation rules
//!
//! Rounds that add or remove members, change class modifiers or rewire the
//! hierarchy, checked against the files they pull into the next round.

mod common;

use cascade::graph::Propagation;
use cascade::model::{
    Access, ClassDescriptor, ElementType, MethodDescriptor, RetentionPolicy, UsageRecord, OBJECT_CLASS,
};
use common::assertions::{affected, assert_affects, assert_spares, files};
use common::fixtures::{int, long, Project};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[test]
fn e2e_method_added_to_abstract_class_affects_subclasses() {
    let project = Project::in_memory();
    let a = project.id("p/A");
    let abstract_a = || project.class_with("p/A", Access::PUBLIC | Access::ABSTRACT, OBJECT_CLASS);

    project.build(vec![
        ("A.java", vec![abstract_a()]),
        ("B.java", vec![project.class("p/B", "p/A")]),
        ("C.java", vec![project.class("p/C", "p/B")]),
        ("Mentions.java", vec![project.plain_class("p/Mentions").with_usage(UsageRecord::class(a))]),
    ]);

    let run = project.method("run", Access::PUBLIC | Access::ABSTRACT, int());
    let (_delta, propagation) = project.round(vec![("A.java", vec![abstract_a().with_method(run)])], &[]);

    assert_affects(&propagation, &["B.java", "C.java"]);
    assert_spares(&propagation, &["Mentions.java"]);
}

#[test]
fn e2e_method_added_to_interface_affects_implementors() {
    let project = Project::in_memory();
    let api = project.id("p/Api");
    let interface = || project.class_with("p/Api", Access::PUBLIC | Access::INTERFACE | Access::ABSTRACT, OBJECT_CLASS);

    project.build(vec![
        ("Api.java", vec![interface()]),
        ("Impl.java", vec![project.plain_class("p/Impl").with_interface(api)]),
        ("Other.java", vec![project.plain_class("p/Other")]),
    ]);

    let size = project.method("size", Access::PUBLIC | Access::ABSTRACT, int());
    let (_delta, propagation) = project.round(vec![("Api.java", vec![interface().with_method(size)])], &[]);

    assert_affects(&propagation, &["Impl.java"]);
    assert_spares(&propagation, &["Other.java"]);
}

#[test]
fn e2e_new_overload_affects_calls_that_may_rebind() {
    let project = Project::in_memory();
    let (a, b) = (project.id("p/A"), project.id("p/B"));
    let by_long = MethodDescriptor::new(project.id("m"), Access::PUBLIC, vec![long()], int());
    let by_int = MethodDescriptor::new(project.id("m"), Access::PUBLIC, vec![int()], int());

    let class_a = project.plain_class("p/A").with_method(by_long.clone());
    project.build(vec![
        ("Object.java", vec![project.object()]),
        ("A.java", vec![class_a.clone()]),
        ("B.java", vec![project.class("p/B", "p/A")]),
        (
            "Caller.java",
            vec![project
                .plain_class("p/Caller")
                .with_usages([by_long.usage(a), by_long.meta_usage(a)])],
        ),
        ("SubCaller.java", vec![project.plain_class("p/SubCaller").with_usage(by_long.meta_usage(b))]),
        ("Mentions.java", vec![project.plain_class("p/Mentions").with_usage(UsageRecord::class(a))]),
    ]);

    let (_delta, propagation) = project.round(vec![("A.java", vec![class_a.with_method(by_int)])], &[]);

    assert_eq!(affected(&propagation), files(&["Caller.java", "SubCaller.java"]));
}

/// Remove `run` from `p/Impl`, whose superclass `p/Base` declares it either
/// abstract or concrete. `p/Leaf` inherits the implementation, `p/Own`
/// overrides it.
fn remove_implementation(base_is_abstract: bool) -> BTreeSet<PathBuf> {
    let project = Project::in_memory();
    let (base_access, run_access) = if base_is_abstract {
        (Access::PUBLIC | Access::ABSTRACT, Access::PUBLIC | Access::ABSTRACT)
    } else {
        (Access::PUBLIC, Access::PUBLIC)
    };
    let run = project.method("run", Access::PUBLIC, int());

    project.build(vec![
        (
            "Base.java",
            vec![project
                .class_with("p/Base", base_access, OBJECT_CLASS)
                .with_method(project.method("run", run_access, int()))],
        ),
        ("Impl.java", vec![project.class("p/Impl", "p/Base").with_method(run.clone())]),
        ("Leaf.java", vec![project.class("p/Leaf", "p/Impl")]),
        ("Own.java", vec![project.class("p/Own", "p/Impl").with_method(run)]),
    ]);

    let (_delta, propagation) = project.round(vec![("Impl.java", vec![project.class("p/Impl", "p/Base")])], &[]);
    affected(&propagation)
}

#[test]
fn e2e_removed_override_of_abstract_method_affects_inheriting_subclasses() {
    assert_eq!(remove_implementation(true), files(&["Leaf.java", "Own.java"]));
    assert_eq!(remove_implementation(false), files(&["Own.java"]));
}

#[test]
fn e2e_added_field_affects_subclasses_that_may_shadow_it() {
    let project = Project::in_memory();
    let (outer, other) = (project.id("p/Outer"), project.id("p/Other"));

    project.build(vec![
        ("A.java", vec![project.plain_class("p/A")]),
        ("User.java", vec![project.class("p/User$1", "p/A").local()]),
        (
            "Outer.java",
            vec![
                project.plain_class("p/Outer").with_field(project.field("x", Access::PUBLIC)),
                project.class("p/Outer$Inner", "p/A").with_outer_class(outer),
            ],
        ),
        (
            "Other.java",
            vec![
                project.plain_class("p/Other"),
                project.class("p/Other$Inner", "p/A").with_outer_class(other),
            ],
        ),
        ("Plain.java", vec![project.class("p/Plain", "p/A")]),
    ]);

    let x = project.field("x", Access::PUBLIC);
    let (_delta, propagation) = project.round(vec![("A.java", vec![project.plain_class("p/A").with_field(x)])], &[]);

    assert_eq!(affected(&propagation), files(&["Outer.java", "User.java"]));
}

/// Add a field `x` with `access` to `p/Mid`, hiding the protected `x` of
/// its superclass `p/Base`; every reader goes through `p/Mid`
fn hide_protected_field(access: Access) -> BTreeSet<PathBuf> {
    let project = Project::in_memory();
    let mid = project.id("p/Mid");
    let inherited = project.field("x", Access::PROTECTED);

    project.build(vec![
        ("Base.java", vec![project.plain_class("p/Base").with_field(inherited.clone())]),
        ("Mid.java", vec![project.class("p/Mid", "p/Base")]),
        ("SubReader.java", vec![project.class("p/SubReader", "p/Mid").with_usage(inherited.usage(mid))]),
        ("Reader.java", vec![project.plain_class("p/Reader").with_usage(inherited.usage(mid))]),
        ("q/Far.java", vec![project.class("q/Far", "p/Mid").with_usage(inherited.usage(mid))]),
    ]);

    let hiding = project.field("x", access);
    let (_delta, propagation) =
        project.round(vec![("Mid.java", vec![project.class("p/Mid", "p/Base").with_field(hiding)])], &[]);
    affected(&propagation)
}

#[test]
fn e2e_field_hiding_rebinds_readers_by_visibility() {
    assert_eq!(hide_protected_field(Access::PUBLIC), files(&["SubReader.java"]));
    assert_eq!(
        hide_protected_field(Access::PROTECTED),
        files(&["Reader.java", "SubReader.java", "q/Far.java"])
    );
}

/// Recompile `p/Box` with `access` and report what its users must redo
fn change_box_access(access: Access) -> BTreeSet<PathBuf> {
    let project = Project::in_memory();
    let bx = project.id("p/Box");

    project.build(vec![
        ("Box.java", vec![project.plain_class("p/Box")]),
        ("Kin.java", vec![project.class("p/Kin", "p/Box").with_usage(UsageRecord::class(bx))]),
        ("Neighbour.java", vec![project.plain_class("p/Neighbour").with_usage(UsageRecord::class(bx))]),
        ("Maker.java", vec![project.plain_class("p/Maker").with_usage(UsageRecord::class_new(bx))]),
        ("q/Stranger.java", vec![project.plain_class("q/Stranger").with_usage(UsageRecord::class(bx))]),
    ]);

    let changed = project.class_with("p/Box", access, OBJECT_CLASS);
    let (_delta, propagation) = project.round(vec![("Box.java", vec![changed])], &[]);
    affected(&propagation)
}

#[test]
fn e2e_class_made_protected_spares_package_inheritors() {
    assert_eq!(
        change_box_access(Access::PROTECTED),
        files(&["Neighbour.java", "q/Stranger.java"])
    );
}

#[test]
fn e2e_class_made_package_local_affects_other_packages() {
    assert_eq!(change_box_access(Access::empty()), files(&["q/Stranger.java"]));
}

#[test]
fn e2e_class_made_final_affects_every_mention() {
    assert_eq!(
        change_box_access(Access::PUBLIC | Access::FINAL),
        files(&["Kin.java", "Neighbour.java", "q/Stranger.java"])
    );
}

#[test]
fn e2e_class_made_abstract_affects_instantiations_only() {
    assert_eq!(change_box_access(Access::PUBLIC | Access::ABSTRACT), files(&["Maker.java"]));
}

/// `p/Leaf` extends `p/Mid`, which extends `p/Base` or nothing; one user
/// mentions each of them
fn layered_project(mid_extends_base: bool) -> Project {
    let project = Project::in_memory();
    let (base, mid, leaf) = (project.id("p/Base"), project.id("p/Mid"), project.id("p/Leaf"));
    let mid_class = if mid_extends_base {
        project.class("p/Mid", "p/Base")
    } else {
        project.plain_class("p/Mid")
    };

    project.build(vec![
        ("Base.java", vec![project.plain_class("p/Base")]),
        ("Mid.java", vec![mid_class]),
        ("Leaf.java", vec![project.class("p/Leaf", "p/Mid")]),
        ("BaseUser.java", vec![project.plain_class("p/BaseUser").with_usage(UsageRecord::class(base))]),
        ("MidUser.java", vec![project.plain_class("p/MidUser").with_usage(UsageRecord::class(mid))]),
        ("LeafUser.java", vec![project.plain_class("p/LeafUser").with_usage(UsageRecord::class(leaf))]),
    ]);
    project
}

#[test]
fn e2e_dropped_superclass_affects_subclasses_and_their_users() {
    let project = layered_project(true);

    let (_delta, propagation) = project.round(vec![("Mid.java", vec![project.plain_class("p/Mid")])], &[]);

    assert_affects(&propagation, &["Leaf.java", "MidUser.java", "LeafUser.java"]);
    assert_spares(&propagation, &["BaseUser.java"]);
}

#[test]
fn e2e_added_superclass_affects_subclass_files_only() {
    let project = layered_project(false);

    let (_delta, propagation) = project.round(vec![("Mid.java", vec![project.class("p/Mid", "p/Base")])], &[]);

    assert_affects(&propagation, &["Leaf.java"]);
    assert_spares(&propagation, &["BaseUser.java", "MidUser.java", "LeafUser.java"]);
}

#[test]
fn e2e_removed_interface_affects_implementors_below() {
    let project = Project::in_memory();
    let (api, sub) = (project.id("p/Api"), project.id("p/SubImpl"));

    project.build(vec![
        (
            "Api.java",
            vec![project.class_with("p/Api", Access::PUBLIC | Access::INTERFACE | Access::ABSTRACT, OBJECT_CLASS)],
        ),
        ("Impl.java", vec![project.plain_class("p/Impl").with_interface(api)]),
        ("SubImpl.java", vec![project.class("p/SubImpl", "p/Impl")]),
        ("SubUser.java", vec![project.plain_class("p/SubUser").with_usage(UsageRecord::class(sub))]),
        ("Other.java", vec![project.plain_class("p/Other")]),
    ]);

    let propagation = project.commit(vec![("Impl.java", vec![project.plain_class("p/Impl")])], &[]);
    assert_affects(&propagation, &["SubImpl.java", "SubUser.java"]);
    assert_spares(&propagation, &["Other.java"]);

    let snapshot = project.graph.snapshot().unwrap();
    assert!(!snapshot.class_to_subclasses.contains_key("p/Api"));
}

fn marker(project: &Project, access: Access, targets: &[ElementType]) -> ClassDescriptor {
    project
        .class_with("p/Marker", access, OBJECT_CLASS)
        .annotation(RetentionPolicy::Runtime, targets.iter().copied())
}

#[test]
fn e2e_package_annotation_losing_local_variable_target_widens_to_package() {
    let project = Project::in_memory();
    project.build(vec![
        ("Marker.java", vec![marker(&project, Access::empty(), &[ElementType::LocalVariable, ElementType::Method])]),
        ("User.java", vec![project.plain_class("p/User")]),
        ("q/Outside.java", vec![project.plain_class("q/Outside")]),
    ]);

    let narrowed = marker(&project, Access::empty(), &[ElementType::Method]);
    let (_delta, propagation) = project.round(vec![("Marker.java", vec![narrowed])], &[]);

    assert_affects(&propagation, &["User.java"]);
    assert_spares(&propagation, &["q/Outside.java"]);
}

#[test]
fn e2e_public_annotation_losing_local_variable_target_forces_rebuild() {
    let project = Project::in_memory();
    project.build(vec![
        ("Marker.java", vec![marker(&project, Access::PUBLIC, &[ElementType::LocalVariable])]),
        ("User.java", vec![project.plain_class("p/User")]),
    ]);

    let narrowed = marker(&project, Access::PUBLIC, &[ElementType::Type]);
    let (_delta, propagation) = project.round(vec![("Marker.java", vec![narrowed])], &[]);

    assert_eq!(propagation, Propagation::FullRebuildRequired);
}
