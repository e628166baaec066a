//! Record factories shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use catalog_store::{
    Course, CourseRun, CourseRunStatus, CourseType, Image, MemoryRecordStore, RecordId,
    RecordStoreExt, Seat, Video,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn days(n: i64) -> DateTime<Utc> {
    now() + Duration::days(n)
}

/// Creates records with fresh ids and saves them to the store.
pub struct Factory<'a> {
    pub store: &'a MemoryRecordStore,
    next_id: AtomicU64,
}

impl<'a> Factory<'a> {
    pub fn new(store: &'a MemoryRecordStore) -> Self {
        Self {
            store,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn id(&self) -> RecordId {
        RecordId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub async fn image(&self) -> Image {
        let id = self.id();
        let image = Image {
            id,
            src: format!("https://img.example.com/{id}.png"),
            description: Some(format!("image {id}")),
            height: Some(480),
            width: Some(640),
        };
        self.store.save_record(&image).await.unwrap();
        image
    }

    pub async fn video(&self) -> Video {
        let image = self.image().await;
        let id = self.id();
        let video = Video {
            id,
            src: format!("https://videos.example.com/{id}.mp4"),
            description: Some(format!("video {id}")),
            image: Some(image.id),
        };
        self.store.save_record(&video).await.unwrap();
        video
    }

    pub async fn course_type(&self, slug: &str) -> CourseType {
        let course_type = CourseType {
            id: self.id(),
            slug: slug.to_string(),
            name: slug.to_uppercase(),
        };
        self.store.save_record(&course_type).await.unwrap();
        course_type
    }

    pub async fn course(&self, key: &str, course_type: &CourseType) -> Course {
        let course = Course {
            id: self.id(),
            uuid: Uuid::new_v4(),
            key: key.to_string(),
            title: format!("Course {key}"),
            course_type: course_type.id,
            modified: now(),
            ..Default::default()
        };
        self.store.save_record(&course).await.unwrap();
        course
    }

    /// A published, marketable run of `course` with its own video.
    pub async fn course_run(&self, course: &Course, title: &str) -> CourseRun {
        let video = self.video().await;
        let id = self.id();
        let run = CourseRun {
            id,
            uuid: Uuid::new_v4(),
            key: format!("course-v1:{}+{}", course.key, id),
            title: title.to_string(),
            course: course.id,
            status: CourseRunStatus::Published,
            marketable: true,
            start: Some(days(-10)),
            end: Some(days(80)),
            enrollment_start: Some(days(-30)),
            enrollment_end: Some(days(70)),
            video: Some(video.id),
            seats: vec![
                Seat {
                    seat_type: "audit".into(),
                    price: 0,
                },
                Seat {
                    seat_type: "verified".into(),
                    price: 149,
                },
            ],
            ..Default::default()
        };
        self.store.save_record(&run).await.unwrap();
        run
    }

    pub async fn save<R: catalog_store::Record>(&self, record: &R) {
        self.store.save_record(record).await.unwrap();
    }
}
