//! Repository Implementation

use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::StorageError;

/// Timestamp format surfaced to API clients
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS patients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        age INTEGER,
        gender TEXT NOT NULL DEFAULT '',
        email TEXT NOT NULL DEFAULT '',
        phone TEXT NOT NULL DEFAULT '',
        address TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS scans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER NOT NULL REFERENCES patients(id),
        file_path TEXT NOT NULL,
        scan_type TEXT NOT NULL,
        scan_date TEXT NOT NULL,
        predicted_class TEXT NOT NULL,
        confidence REAL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS blink_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER NOT NULL REFERENCES patients(id),
        blink_count INTEGER NOT NULL,
        duration REAL NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS typing_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER NOT NULL REFERENCES patients(id),
        wpm REAL NOT NULL,
        accuracy REAL NOT NULL,
        test_text TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
];

/// New patient registration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub age: Option<i64>,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// Stored patient row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PatientRecord {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub created_at: String,
}

/// New scan classification result
#[derive(Debug, Clone)]
pub struct NewScan {
    pub patient_id: i64,
    pub file_path: String,
    pub scan_type: String,
    pub scan_date: String,
    pub predicted_class: String,
    pub confidence: Option<f64>,
}

/// Stored scan row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ScanRecord {
    pub id: i64,
    pub patient_id: i64,
    pub file_path: String,
    pub scan_type: String,
    pub scan_date: String,
    pub predicted_class: String,
    pub confidence: Option<f64>,
    pub created_at: String,
}

/// Stored blink-test row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BlinkResultRecord {
    pub id: i64,
    pub patient_id: i64,
    pub blink_count: i64,
    pub duration: f64,
    pub created_at: String,
}

/// Stored typing-test row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TypingResultRecord {
    pub id: i64,
    pub patient_id: i64,
    pub wpm: f64,
    pub accuracy: f64,
    pub test_text: String,
    pub created_at: String,
}

/// SQLite-backed repository
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Connect to the database, creating the file and schema if missing
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        info!("Connecting to database at {}", database_url);
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let repo = Self { pool };
        repo.migrate().await?;
        Ok(repo)
    }

    /// In-memory database for tests. Single connection: each in-memory
    /// SQLite connection is its own database.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let repo = Self { pool };
        repo.migrate().await?;
        Ok(repo)
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Schema ready");
        Ok(())
    }

    fn now() -> String {
        Utc::now().format(TIMESTAMP_FORMAT).to_string()
    }

    /// Insert a patient, returning the new id
    pub async fn insert_patient(&self, patient: &NewPatient) -> Result<i64, StorageError> {
        let result = sqlx::query(
            "INSERT INTO patients (name, age, gender, email, phone, address, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&patient.name)
        .bind(patient.age)
        .bind(&patient.gender)
        .bind(&patient.email)
        .bind(&patient.phone)
        .bind(&patient.address)
        .bind(Self::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Fetch one patient
    pub async fn get_patient(&self, id: i64) -> Result<Option<PatientRecord>, StorageError> {
        let record = sqlx::query_as::<_, PatientRecord>("SELECT * FROM patients WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// All patients, newest first
    pub async fn list_patients(&self) -> Result<Vec<PatientRecord>, StorageError> {
        let records = sqlx::query_as::<_, PatientRecord>(
            "SELECT * FROM patients ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Insert a scan result, returning the new id
    pub async fn insert_scan(&self, scan: &NewScan) -> Result<i64, StorageError> {
        let result = sqlx::query(
            "INSERT INTO scans
             (patient_id, file_path, scan_type, scan_date, predicted_class, confidence, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(scan.patient_id)
        .bind(&scan.file_path)
        .bind(&scan.scan_type)
        .bind(&scan.scan_date)
        .bind(&scan.predicted_class)
        .bind(scan.confidence)
        .bind(Self::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Scans for one patient, oldest first
    pub async fn scans_for_patient(&self, patient_id: i64) -> Result<Vec<ScanRecord>, StorageError> {
        let records = sqlx::query_as::<_, ScanRecord>(
            "SELECT * FROM scans WHERE patient_id = ? ORDER BY id",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Insert a blink-test result, returning the new id
    pub async fn insert_blink_result(
        &self,
        patient_id: i64,
        blink_count: i64,
        duration: f64,
    ) -> Result<i64, StorageError> {
        let result = sqlx::query(
            "INSERT INTO blink_results (patient_id, blink_count, duration, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(patient_id)
        .bind(blink_count)
        .bind(duration)
        .bind(Self::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Blink results for one patient, oldest first
    pub async fn blink_results_for_patient(
        &self,
        patient_id: i64,
    ) -> Result<Vec<BlinkResultRecord>, StorageError> {
        let records = sqlx::query_as::<_, BlinkResultRecord>(
            "SELECT * FROM blink_results WHERE patient_id = ? ORDER BY id",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Insert a typing-test result, returning the new id
    pub async fn insert_typing_result(
        &self,
        patient_id: i64,
        wpm: f64,
        accuracy: f64,
        test_text: &str,
    ) -> Result<i64, StorageError> {
        let result = sqlx::query(
            "INSERT INTO typing_results (patient_id, wpm, accuracy, test_text, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(patient_id)
        .bind(wpm)
        .bind(accuracy)
        .bind(test_text)
        .bind(Self::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Typing results for one patient, oldest first
    pub async fn typing_results_for_patient(
        &self,
        patient_id: i64,
    ) -> Result<Vec<TypingResultRecord>, StorageError> {
        let records = sqlx::query_as::<_, TypingResultRecord>(
            "SELECT * FROM typing_results WHERE patient_id = ? ORDER BY id",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Total registered patients
    pub async fn patient_count(&self) -> Result<i64, StorageError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM patients")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Total stored scans
    pub async fn scan_count(&self) -> Result<i64, StorageError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scans")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
