mod support;

use support::{TestTracker, ADMIN_EMAIL};

const BOB: &str = "bob@example.com";

#[test]
fn project_lifecycle() {
    let tracker = TestTracker::init();

    let project = tracker.json(
        ADMIN_EMAIL,
        &["project", "new", "Website", "--description", "relaunch", "--due", "2025-03-01"],
    );
    let id = project["id"].as_u64().expect("project id").to_string();
    assert_eq!(project["status"], "pending");
    assert_eq!(project["due_date"], "2025-03-01");

    let edited = tracker.json(
        ADMIN_EMAIL,
        &["project", "edit", &id, "--status", "in_progress", "--clear-due"],
    );
    assert_eq!(edited["status"], "in_progress");
    assert!(edited.get("due_date").map_or(true, |value| value.is_null()));

    let listed = tracker.json(ADMIN_EMAIL, &["project", "list", "--status", "in_progress"]);
    assert_eq!(listed.as_array().expect("projects").len(), 1);
    let listed = tracker.json(ADMIN_EMAIL, &["project", "list", "--status", "completed"]);
    assert!(listed.as_array().expect("projects").is_empty());
}

#[test]
fn deleting_a_project_detaches_its_tasks() {
    let tracker = TestTracker::init();
    let project = tracker.json(ADMIN_EMAIL, &["project", "new", "Website"]);
    let project_id = project["id"].as_u64().expect("project id");
    let task = tracker.new_task("Landing page", &["--project", &project_id.to_string()]);
    assert_eq!(tracker.task(task)["project_id"], project_id);

    let deletion = tracker.json(ADMIN_EMAIL, &["project", "rm", &project_id.to_string()]);
    assert_eq!(deletion["detached_tasks"], 1);

    assert!(tracker.task(task)["project_id"].is_null());
    let envelope = tracker.json_err(
        ADMIN_EMAIL,
        &["project", "show", &project_id.to_string()],
        2,
    );
    assert_eq!(envelope["error"]["kind"], "not_found");
}

#[test]
fn assigned_users_see_the_project_but_only_their_tasks() {
    let tracker = TestTracker::init();
    let bob = tracker.add_user("Bob", BOB);
    let project = tracker.json(ADMIN_EMAIL, &["project", "new", "Website"]);
    let project_id = project["id"].as_u64().expect("project id").to_string();
    tracker.new_task("Bob's", &["--project", &project_id, "--assign", &bob.to_string()]);
    tracker.new_task("Admin's", &["--project", &project_id]);

    tracker.json_err(BOB, &["project", "show", &project_id], 3);
    assert!(tracker
        .json(BOB, &["project", "list"])
        .as_array()
        .expect("projects")
        .is_empty());

    let assigned = tracker.json(
        ADMIN_EMAIL,
        &["project", "assign", &project_id, &bob.to_string()],
    );
    assert_eq!(assigned["assigned_user_ids"][0], bob);

    let view = tracker.json(BOB, &["project", "show", &project_id]);
    let names: Vec<&str> = view["tasks"]
        .as_array()
        .expect("tasks")
        .iter()
        .filter_map(|task| task["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Bob's"]);

    let admin_view = tracker.json(ADMIN_EMAIL, &["project", "show", &project_id]);
    assert_eq!(admin_view["tasks"].as_array().expect("tasks").len(), 2);
}

#[test]
fn assigning_an_unknown_user_fails() {
    let tracker = TestTracker::init();
    let project = tracker.json(ADMIN_EMAIL, &["project", "new", "Website"]);
    let project_id = project["id"].as_u64().expect("project id").to_string();

    let envelope = tracker.json_err(ADMIN_EMAIL, &["project", "assign", &project_id, "42"], 2);
    assert_eq!(envelope["error"]["kind"], "not_found");
}

#[test]
fn dashboard_counts_visible_work() {
    let tracker = TestTracker::init();
    let parent = tracker.new_task("Parent", &[]);
    tracker.new_task("Child", &["--parent", &parent.to_string(), "--status", "completed"]);
    tracker.new_task("Other", &["--status", "in_progress"]);
    tracker.json(ADMIN_EMAIL, &["project", "new", "Website"]);

    let dashboard = tracker.json(ADMIN_EMAIL, &["dashboard"]);
    assert_eq!(dashboard["tasks"]["total"], 3);
    assert_eq!(dashboard["tasks"]["completed"], 1);
    assert_eq!(dashboard["tasks"]["in_progress"], 1);
    assert_eq!(dashboard["tasks"]["pending"], 1);
    assert_eq!(dashboard["projects"]["total"], 1);
    assert_eq!(dashboard["active_tasks"].as_array().expect("active").len(), 2);
    assert_eq!(dashboard["running_timers"], 0);
}
