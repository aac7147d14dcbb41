//! Built-in scenarios for the course platform's instructor endpoints

use coursecheck_common::{Aggregate, ExpectedValue, FixtureKind};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::assert::{Check, EqualsValue};
use crate::execute::RequestSpec;
use crate::provision::FixtureSpec;
use crate::spec::ScenarioSpec;

pub fn all() -> Vec<ScenarioSpec> {
    vec![
        instructor_analytics(),
        course_students(),
        instructor_courses(),
        course_earnings(),
        student_enrollments(),
    ]
}

fn instructor(alias: &str) -> FixtureSpec {
    FixtureSpec::new(
        alias,
        FixtureKind::Instructor,
        json!({
            "full_name": "Test Instructor",
            "email": format!("{}-${{run}}@example.com", alias),
            "password": "TestPass123!",
            "role": "instructor"
        }),
    )
}

fn course(alias: &str, instructor: &str, title: &str) -> FixtureSpec {
    FixtureSpec::new(
        alias,
        FixtureKind::Course,
        json!({
            "title": title,
            "description": format!("{} created by coursecheck", title),
            "instructor_id": format!("${{{}}}", instructor)
        }),
    )
}

/// A student enrolled in `course`, plus optional progress and rating
fn enrolled_student(
    n: usize,
    course: &str,
    progress: Option<u32>,
    rating: Option<f64>,
) -> Vec<FixtureSpec> {
    let student = format!("student-{}", n);
    let mut specs = vec![
        FixtureSpec::new(
            student.as_str(),
            FixtureKind::Student,
            json!({
                "full_name": format!("Student {}", n),
                "email": format!("student{}-${{run}}@example.com", n),
                "password": "Pwd12345!"
            }),
        ),
        FixtureSpec::new(
            format!("enrollment-{}", n),
            FixtureKind::Enrollment,
            link(course, &student),
        ),
    ];
    if let Some(progress) = progress {
        let mut payload = link(course, &student);
        payload["progress"] = json!(progress);
        specs.push(FixtureSpec::new(format!("progress-{}", n), FixtureKind::Progress, payload));
    }
    if let Some(rating) = rating {
        let mut payload = link(course, &student);
        payload["rating"] = json!(rating);
        specs.push(FixtureSpec::new(format!("rating-{}", n), FixtureKind::Rating, payload));
    }
    specs
}

fn link(course: &str, student: &str) -> Value {
    json!({
        "course_id": format!("${{{}}}", course),
        "student_id": format!("${{{}}}", student)
    })
}

fn payment(n: usize, instructor: &str, amount: f64, status: &str) -> FixtureSpec {
    FixtureSpec::new(
        format!("payment-{}", n),
        FixtureKind::Payment,
        json!({
            "instructor_id": format!("${{{}}}", instructor),
            "amount": amount,
            "status": status
        }),
    )
}

/// Payment attributed to one of the instructor's courses
fn course_payment(n: usize, instructor: &str, course: &str, amount: f64, status: &str) -> FixtureSpec {
    let mut spec = payment(n, instructor, amount, status);
    spec.payload["course_id"] = json!(format!("${{{}}}", course));
    spec
}

fn where_eq(field: &str, value: &str) -> BTreeMap<String, Value> {
    BTreeMap::from([(field.to_string(), json!(value))])
}

fn student_profile_checks() -> Vec<Check> {
    vec![
        Check::Status { expected: 200 },
        Check::IsArray { at: String::new() },
        Check::Required {
            at: String::new(),
            fields: vec!["full_name".into(), "email".into()],
        },
        Check::Range {
            at: String::new(),
            field: "progress".into(),
            min: 0.0,
            max: 100.0,
            optional: true,
        },
    ]
}

/// Analytics totals match what was provisioned: enrolled students, revenue
/// from succeeded payments only, and the mean rating
pub fn instructor_analytics() -> ScenarioSpec {
    let mut fixtures = vec![
        instructor("instructor"),
        course("course", "instructor", "Test Course"),
    ];
    fixtures.extend(enrolled_student(1, "course", Some(50), Some(4.0)));
    fixtures.extend(enrolled_student(2, "course", Some(60), Some(5.0)));
    fixtures.push(payment(1, "instructor", 100.0, "succeeded"));
    fixtures.push(payment(2, "instructor", 150.0, "succeeded"));
    fixtures.push(payment(3, "instructor", 75.0, "failed"));

    let analytics = RequestSpec::get("/instructors/${instructor}/analytics")
        .expect(Check::Status { expected: 200 })
        .expect(Check::Aggregate {
            fields: vec!["/total_students".into()],
            expected: ExpectedValue::Computed(Aggregate::Count {
                kind: FixtureKind::Student,
                filter: BTreeMap::new(),
            }),
            tolerance: coursecheck_common::DEFAULT_TOLERANCE,
        })
        .expect(Check::Aggregate {
            fields: vec!["/total_revenue".into()],
            expected: ExpectedValue::Computed(Aggregate::Sum {
                kind: FixtureKind::Payment,
                field: "amount".into(),
                filter: where_eq("status", "succeeded"),
            }),
            tolerance: coursecheck_common::DEFAULT_TOLERANCE,
        })
        .expect(Check::Aggregate {
            fields: vec!["/average_rating".into(), "/average_ratings".into()],
            expected: ExpectedValue::Computed(Aggregate::Mean {
                kind: FixtureKind::Rating,
                field: "rating".into(),
                filter: BTreeMap::new(),
            }),
            tolerance: coursecheck_common::DEFAULT_TOLERANCE,
        });

    let mut students = RequestSpec::get("/courses/${course}/students");
    students.expect = student_profile_checks();
    students.expect.push(Check::Length {
        at: String::new(),
        expected: ExpectedValue::Computed(Aggregate::Count {
            kind: FixtureKind::Enrollment,
            filter: BTreeMap::new(),
        }),
    });

    ScenarioSpec {
        name: "instructor-analytics".to_string(),
        description: "Instructor analytics report students, succeeded revenue and mean rating"
            .to_string(),
        tags: vec!["analytics".to_string(), "smoke".to_string()],
        fixtures,
        requests: vec![analytics, students],
    }
}

/// Course roster carries profile data; progress may be missing
pub fn course_students() -> ScenarioSpec {
    let mut fixtures = vec![
        instructor("instructor"),
        course("course", "instructor", "Test Course for Student Progress"),
    ];
    fixtures.extend(enrolled_student(1, "course", Some(35), None));
    fixtures.extend(enrolled_student(2, "course", None, None));

    let mut roster = RequestSpec::get("/courses/${course}/students");
    roster.expect = student_profile_checks();
    roster.expect.push(Check::Length {
        at: String::new(),
        expected: ExpectedValue::Literal(2.0),
    });

    ScenarioSpec {
        name: "course-students".to_string(),
        description: "Course students list profiles with optional progress".to_string(),
        tags: vec!["courses".to_string()],
        fixtures,
        requests: vec![roster],
    }
}

/// Every course created for an instructor is listed for that instructor
pub fn instructor_courses() -> ScenarioSpec {
    let fixtures = vec![
        instructor("instructor"),
        course("course-1", "instructor", "Test Course 1"),
        course("course-2", "instructor", "Test Course 2"),
    ];

    let listing = RequestSpec::get("/instructors/${instructor}/courses")
        .expect(Check::Status { expected: 200 })
        .expect(Check::IsArray { at: String::new() })
        .expect(Check::ContainsIds {
            at: String::new(),
            id_field: "id".into(),
            aliases: vec!["course-1".into(), "course-2".into()],
        });

    ScenarioSpec {
        name: "instructor-courses".to_string(),
        description: "Instructor course listing includes newly created courses".to_string(),
        tags: vec!["courses".to_string(), "smoke".to_string()],
        fixtures,
        requests: vec![listing],
    }
}

/// Per-course earnings cover every course of the instructor, and the
/// analytics revenue is the sum of succeeded payments
pub fn course_earnings() -> ScenarioSpec {
    let mut fixtures = vec![
        instructor("instructor"),
        course("course-1", "instructor", "Earnings Course 1"),
        course("course-2", "instructor", "Earnings Course 2"),
    ];
    fixtures.extend(enrolled_student(1, "course-1", None, None));
    fixtures.push(course_payment(1, "instructor", "course-1", 120.0, "succeeded"));
    fixtures.push(course_payment(2, "instructor", "course-2", 80.0, "succeeded"));
    fixtures.push(course_payment(3, "instructor", "course-1", 40.0, "failed"));

    let earnings = RequestSpec::get("/instructors/${instructor}/course-earnings")
        .expect(Check::Status { expected: 200 })
        .expect(Check::IsArray { at: "/courses".into() })
        .expect(Check::Required {
            at: "/courses".into(),
            fields: vec!["course_id".into()],
        })
        .expect(Check::IsNumber {
            at: "/courses".into(),
            field: "earnings".into(),
            optional: false,
        })
        .expect(Check::ContainsIds {
            at: "/courses".into(),
            id_field: "course_id".into(),
            aliases: vec!["course-1".into(), "course-2".into()],
        });

    let analytics = RequestSpec::get("/instructors/${instructor}/analytics")
        .expect(Check::Status { expected: 200 })
        .expect(Check::Equals {
            field: "/total_revenue".into(),
            value: EqualsValue::Expected(ExpectedValue::Computed(Aggregate::Sum {
                kind: FixtureKind::Payment,
                field: "amount".into(),
                filter: where_eq("status", "succeeded"),
            })),
        })
        .expect(Check::Equals {
            field: "/average_rating".into(),
            value: Value::Null.into(),
        });

    ScenarioSpec {
        name: "course-earnings".to_string(),
        description: "Course earnings list every course of the instructor with numeric earnings"
            .to_string(),
        tags: vec!["analytics".to_string(), "earnings".to_string()],
        fixtures,
        requests: vec![earnings, analytics],
    }
}

/// Recent enrollments are capped by `limit`, carry the student profile and
/// only reference the instructor's own courses
pub fn student_enrollments() -> ScenarioSpec {
    let mut fixtures = vec![
        instructor("instructor"),
        course("course-1", "instructor", "Enrollment Course 1"),
        course("course-2", "instructor", "Enrollment Course 2"),
        instructor("other-instructor"),
        course("other-course", "other-instructor", "Someone Else's Course"),
    ];
    fixtures.extend(enrolled_student(1, "course-1", Some(20), None));
    fixtures.extend(enrolled_student(2, "course-2", None, None));
    fixtures.extend(enrolled_student(3, "course-1", Some(100), None));
    fixtures.extend(enrolled_student(4, "other-course", Some(70), None));

    let own_courses = vec!["course-1".to_string(), "course-2".to_string()];
    let recent = |limit: usize| {
        RequestSpec::get(format!("/instructors/${{instructor}}/student-enrollments?limit={}", limit))
            .expect(Check::Status { expected: 200 })
            .expect(Check::IsArray { at: String::new() })
            .expect(Check::MaxLength { at: String::new(), max: limit })
            .expect(Check::Required {
                at: String::new(),
                fields: vec!["/student_profile/full_name".into(), "/student_profile/email".into()],
            })
            .expect(Check::IdsWithin {
                at: String::new(),
                id_field: "/course/id".into(),
                aliases: own_courses.clone(),
            })
            .expect(Check::Range {
                at: String::new(),
                field: "progress".into(),
                min: 0.0,
                max: 100.0,
                optional: true,
            })
    };

    let all = recent(10).expect(Check::Length {
        at: String::new(),
        expected: ExpectedValue::Literal(3.0),
    });
    let capped = recent(2).expect(Check::Length {
        at: String::new(),
        expected: ExpectedValue::Literal(2.0),
    });

    ScenarioSpec {
        name: "student-enrollments".to_string(),
        description: "Recent student enrollments honour the limit and stay within the instructor's courses"
            .to_string(),
        tags: vec!["enrollments".to_string()],
        fixtures,
        requests: vec![all, capped],
    }
}
