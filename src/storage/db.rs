use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use crate::core::detox::Detox;
use crate::core::error::{AppError, AppResult};
use crate::core::food::FoodEstimate;
use crate::storage::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// A bot user and their health profile.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Telegram user ID
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    /// "male" / "female"
    pub gender: Option<String>,
    pub age: Option<i64>,
    /// Centimetres
    pub height: Option<i64>,
    /// Kilograms
    pub weight: Option<f64>,
    pub activity_level: Option<String>,
    pub diet_restrictions: Option<String>,
    /// "pregnant" / "breastfeeding" / "not pregnant"
    pub pregnancy_status: Option<String>,
    pub goal: Option<String>,
    pub is_pro: bool,
    /// Hours from UTC
    pub tz_offset: i64,
    pub lang: String,
    pub analysis_count: i64,
    pub chat_count: i64,
    /// Unix seconds, 0 = no trial
    pub trial_expires: i64,
    pub referral_code: Option<String>,
    /// Referrer's user ID, 0 = none
    pub referred_by: i64,
    pub trial_used: bool,
    pub joined_at: String,
    pub last_active: String,
}

const USER_COLUMNS: &str = "id, username, first_name, gender, age, height, weight, activity_level, \
     diet_restrictions, pregnancy_status, goal, is_pro, tz_offset, lang, analysis_count, chat_count, \
     trial_expires, referral_code, referred_by, trial_used, joined_at, last_active";

impl User {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            first_name: row.get(2)?,
            gender: row.get(3)?,
            age: row.get(4)?,
            height: row.get(5)?,
            weight: row.get(6)?,
            activity_level: row.get(7)?,
            diet_restrictions: row.get(8)?,
            pregnancy_status: row.get(9)?,
            goal: row.get(10)?,
            is_pro: row.get::<_, i64>(11)? != 0,
            tz_offset: row.get(12)?,
            lang: row.get(13)?,
            analysis_count: row.get(14)?,
            chat_count: row.get(15)?,
            trial_expires: row.get(16)?,
            referral_code: row.get(17)?,
            referred_by: row.get(18)?,
            trial_used: row.get::<_, i64>(19)? != 0,
            joined_at: row.get(20)?,
            last_active: row.get(21)?,
        })
    }
}

/// A logged symptom
#[derive(Debug, Clone)]
pub struct Symptom {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    pub created_at: String,
}

/// A stored food diary row
#[derive(Debug, Clone)]
pub struct FoodEntry {
    pub id: i64,
    pub user_id: i64,
    pub estimate: FoodEstimate,
    pub created_at: String,
}

/// Aggregate numbers for the admin dashboard
#[derive(Debug, Clone, Default)]
pub struct BotStats {
    pub total_users: i64,
    pub pro_users: i64,
    pub trial_users: i64,
    pub total_analyses: i64,
    pub total_chats: i64,
    pub today_users: i64,
    pub today_activity: i64,
    pub recent_users: Vec<User>,
}

/// Create a new database connection pool
///
/// Every connection runs in WAL mode with foreign keys on. Migrations are
/// applied once on creation. `":memory:"` yields a single-connection pool so
/// all callers share the same in-memory database.
///
/// # Example
///
/// ```no_run
/// use metabolic_center::storage::db;
///
/// let pool = db::create_pool("metabolic.db")?;
/// # Ok::<(), metabolic_center::core::error::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let in_memory = database_path == ":memory:";
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        // journal_mode answers with a row, so it cannot go through execute_batch
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });

    let pool = Pool::builder()
        .max_size(if in_memory { 1 } else { 10 })
        .build(manager)?;

    let mut conn = pool.get()?;
    migrations::run_migrations(&mut conn).map_err(AppError::Anyhow)?;

    Ok(pool)
}

/// Get a connection from the pool
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Returns the user, if known.
pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![id],
        User::from_row,
    )
    .optional()
}

/// Inserts the user if missing and returns the stored row.
///
/// The flag is `true` when this call created the user.
pub fn ensure_user(
    conn: &Connection,
    id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
    lang: Option<&str>,
) -> Result<(User, bool)> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO users (id, username, first_name, lang, joined_at, last_active)
         VALUES (?1, ?2, ?3, ?4, datetime('now'), datetime('now'))",
        params![id, username, first_name, lang.unwrap_or("en")],
    )?;

    let user = get_user(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
    Ok((user, inserted == 1))
}

/// Persists every mutable column of `user` and bumps `last_active`.
pub fn update_user(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "UPDATE users SET gender = ?1, age = ?2, height = ?3, weight = ?4, activity_level = ?5,
            diet_restrictions = ?6, pregnancy_status = ?7, goal = ?8, is_pro = ?9, tz_offset = ?10,
            lang = ?11, analysis_count = ?12, chat_count = ?13, trial_expires = ?14,
            referral_code = ?15, referred_by = ?16, trial_used = ?17, last_active = datetime('now')
         WHERE id = ?18",
        params![
            user.gender,
            user.age,
            user.height,
            user.weight,
            user.activity_level,
            user.diet_restrictions,
            user.pregnancy_status,
            user.goal,
            user.is_pro as i64,
            user.tz_offset,
            user.lang,
            user.analysis_count,
            user.chat_count,
            user.trial_expires,
            user.referral_code,
            user.referred_by,
            user.trial_used as i64,
            user.id,
        ],
    )?;
    Ok(())
}

/// Atomically bumps `analysis_count` and returns the new value.
pub fn increment_analysis_count(conn: &Connection, id: i64) -> Result<i64> {
    conn.query_row(
        "UPDATE users SET analysis_count = analysis_count + 1, last_active = datetime('now')
         WHERE id = ?1 RETURNING analysis_count",
        params![id],
        |row| row.get(0),
    )
}

/// Atomically bumps `chat_count` and returns the new value.
pub fn increment_chat_count(conn: &Connection, id: i64) -> Result<i64> {
    conn.query_row(
        "UPDATE users SET chat_count = chat_count + 1, last_active = datetime('now')
         WHERE id = ?1 RETURNING chat_count",
        params![id],
        |row| row.get(0),
    )
}

pub fn set_pro(conn: &Connection, id: i64, is_pro: bool) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET is_pro = ?1 WHERE id = ?2",
        params![is_pro as i64, id],
    )?;
    Ok(changed == 1)
}

/// All users, oldest first (reminder loop).
pub fn get_all_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY joined_at", USER_COLUMNS))?;
    let rows = stmt.query_map([], User::from_row)?;
    rows.collect()
}

pub fn add_symptom(conn: &Connection, user_id: i64, text: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO symptoms (user_id, text) VALUES (?1, ?2)",
        params![user_id, text],
    )?;
    Ok(())
}

/// Latest 20 symptoms, newest first.
pub fn get_symptoms(conn: &Connection, user_id: i64) -> Result<Vec<Symptom>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, text, created_at FROM symptoms
         WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 20",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(Symptom {
            id: row.get(0)?,
            user_id: row.get(1)?,
            text: row.get(2)?,
            created_at: row.get(3)?,
        })
    })?;
    rows.collect()
}

/// `activity_log.event` values
pub mod events {
    pub const START: &str = "START";
    pub const ANALYSIS: &str = "ANALYSIS";
    pub const SYMPTOM: &str = "SYMPTOM";
    pub const MEAL_PLAN: &str = "MEAL_PLAN";
    pub const SUPPLEMENT: &str = "SUPPLEMENT";
    pub const CHAT: &str = "CHAT";
    pub const UPGRADE_CLICK: &str = "UPGRADE_CLICK";
    pub const FOOD: &str = "FOOD";
    pub const DETOX_START: &str = "DETOX_START";
    pub const DETOX_DAY: &str = "DETOX_DAY";
    pub const DETOX_TIP: &str = "DETOX_TIP";
    pub const DETOX_FINISHED: &str = "DETOX_FINISHED";
    pub const TRIAL: &str = "TRIAL";
    pub const REFERRAL: &str = "REFERRAL";
    pub const SET_PRO: &str = "SET_PRO";

    pub const ALL: [&str; 15] = [
        START,
        ANALYSIS,
        SYMPTOM,
        MEAL_PLAN,
        SUPPLEMENT,
        CHAT,
        UPGRADE_CLICK,
        FOOD,
        DETOX_START,
        DETOX_DAY,
        DETOX_TIP,
        DETOX_FINISHED,
        TRIAL,
        REFERRAL,
        SET_PRO,
    ];
}

/// Appends an event to the activity log.
pub fn log_event(conn: &Connection, user_id: i64, event: &str, details: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO activity_log (user_id, event, details) VALUES (?1, ?2, ?3)",
        params![user_id, event, details],
    )?;
    Ok(())
}

pub fn add_food_entry(conn: &Connection, user_id: i64, estimate: &FoodEstimate) -> Result<()> {
    conn.execute(
        "INSERT INTO food_diary (user_id, description, calories, protein, carbs, fat)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            estimate.description,
            estimate.calories,
            estimate.protein,
            estimate.carbs,
            estimate.fat
        ],
    )?;
    Ok(())
}

fn food_entry_from_row(row: &Row<'_>) -> Result<FoodEntry> {
    Ok(FoodEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        estimate: FoodEstimate {
            description: row.get(2)?,
            calories: row.get(3)?,
            protein: row.get(4)?,
            carbs: row.get(5)?,
            fat: row.get(6)?,
        },
        created_at: row.get(7)?,
    })
}

/// Entries logged at or after `since` (UTC, `datetime()` format), newest first.
///
/// Pass [`local_day_start_utc`](crate::core::utils::local_day_start_utc) to get
/// the user's local day.
pub fn get_today_food(conn: &Connection, user_id: i64, since: &str) -> Result<Vec<FoodEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, description, calories, protein, carbs, fat, created_at FROM food_diary
         WHERE user_id = ?1 AND created_at >= ?2 ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![user_id, since], food_entry_from_row)?;
    rows.collect()
}

/// Latest 30 entries, newest first.
pub fn get_recent_food(conn: &Connection, user_id: i64) -> Result<Vec<FoodEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, description, calories, protein, carbs, fat, created_at FROM food_diary
         WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 30",
    )?;
    let rows = stmt.query_map(params![user_id], food_entry_from_row)?;
    rows.collect()
}

/// Users with at least one entry at or after `since` (UTC, `datetime()` format).
pub fn get_users_with_food_since(conn: &Connection, since: &str) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT DISTINCT user_id FROM food_diary WHERE created_at >= ?1 ORDER BY user_id")?;
    let rows = stmt.query_map(params![since], |row| row.get(0))?;
    rows.collect()
}

fn detox_from_row(row: &Row<'_>) -> Result<Detox> {
    let day: i64 = row.get(1)?;
    let completed: String = row.get(3)?;
    Ok(Detox {
        user_id: row.get(0)?,
        day: day.clamp(1, crate::core::detox::DETOX_DAYS as i64) as u8,
        started_at: row.get(2)?,
        completed: Detox::parse_completed(&completed),
    })
}

pub fn get_detox(conn: &Connection, user_id: i64) -> Result<Option<Detox>> {
    conn.query_row(
        "SELECT user_id, day, started_at, completed_days FROM detox WHERE user_id = ?1",
        params![user_id],
        detox_from_row,
    )
    .optional()
}

/// Starts (or restarts) the program at day 1.
pub fn start_detox(conn: &Connection, user_id: i64) -> Result<Detox> {
    conn.execute(
        "INSERT INTO detox (user_id, day, started_at, completed_days) VALUES (?1, 1, datetime('now'), '')
         ON CONFLICT(user_id) DO UPDATE SET day = 1, started_at = datetime('now'), completed_days = ''",
        params![user_id],
    )?;
    get_detox(conn, user_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

pub fn update_detox(conn: &Connection, detox: &Detox) -> Result<()> {
    conn.execute(
        "UPDATE detox SET day = ?1, completed_days = ?2 WHERE user_id = ?3",
        params![detox.day as i64, detox.completed_days_string(), detox.user_id],
    )?;
    Ok(())
}

/// Users whose program is not finished yet, with their progress.
pub fn get_active_detox_users(conn: &Connection) -> Result<Vec<(User, Detox)>> {
    let mut stmt = conn.prepare("SELECT user_id, day, started_at, completed_days FROM detox")?;
    let rows = stmt.query_map([], detox_from_row)?;

    let mut active = Vec::new();
    for detox in rows {
        let detox = detox?;
        if detox.is_finished() {
            continue;
        }
        if let Some(user) = get_user(conn, detox.user_id)? {
            active.push((user, detox));
        }
    }
    Ok(active)
}

pub fn get_user_by_referral(conn: &Connection, code: &str) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE referral_code = ?1", USER_COLUMNS),
        params![code],
        User::from_row,
    )
    .optional()
}

pub fn count_referrals(conn: &Connection, user_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM users WHERE referred_by = ?1",
        params![user_id],
        |row| row.get(0),
    )
}

/// Clears trial windows that ended before `now_unix`. Returns the number of rows touched.
pub fn expire_trials(conn: &Connection, now_unix: i64) -> Result<usize> {
    let count = conn.execute(
        "UPDATE users SET trial_expires = 0 WHERE trial_expires != 0 AND trial_expires <= ?1",
        params![now_unix],
    )?;

    if count > 0 {
        log::info!("Expired {} trial(s)", count);
    }

    Ok(count)
}

/// Dashboard numbers. Sums over empty tables are reported as 0.
pub fn get_stats(conn: &Connection, now_unix: i64) -> Result<BotStats> {
    let count = |sql: &str| -> Result<i64> { conn.query_row(sql, [], |row| row.get(0)) };

    let total_users = count("SELECT COUNT(*) FROM users")?;
    let pro_users = count("SELECT COUNT(*) FROM users WHERE is_pro = 1")?;
    let total_analyses = count("SELECT COALESCE(SUM(analysis_count), 0) FROM users")?;
    let total_chats = count("SELECT COALESCE(SUM(chat_count), 0) FROM users")?;
    let today_users = count("SELECT COUNT(*) FROM users WHERE joined_at >= date('now')")?;
    let today_activity = count("SELECT COUNT(*) FROM activity_log WHERE created_at >= date('now')")?;
    let trial_users = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE is_pro = 0 AND trial_expires > ?1",
        params![now_unix],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY joined_at DESC, id DESC LIMIT 10",
        USER_COLUMNS
    ))?;
    let recent_users = stmt.query_map([], User::from_row)?.collect::<Result<Vec<_>>>()?;

    Ok(BotStats {
        total_users,
        pro_users,
        trial_users,
        total_analyses,
        total_chats,
        today_users,
        today_activity,
        recent_users,
    })
}
