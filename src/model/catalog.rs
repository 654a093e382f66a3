use crate::schema::{courses, lessons, steps};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

// The course catalog is maintained elsewhere; this subsystem only reads it.
// The Insertable structs exist for seeding (tests, fixtures).

#[derive(Insertable, Debug)]
#[diesel(table_name = courses)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub active: bool,
    // created_at, updated_at have DB defaults
}

#[derive(Insertable, Debug)]
#[diesel(table_name = lessons)]
pub struct NewLesson {
    pub course_id: i64,
    pub order: i32,
    pub title: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = steps)]
pub struct NewStep {
    pub lesson_id: i64,
    pub order: i32,
    pub title: String,
    pub content: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct LessonDataResponse {
    pub lesson_id: i64,
    pub course_id: i64,
    pub order: i32,
    pub title: String,
    pub step_ids: Vec<i64>,
}
