//! Speed preference records
//!
//! Record shape: a global `currentSpeed` row plus zero or more
//! `domain_<hostname>` override rows. Every speed change writes both, so
//! "use on this site" is implicitly sticky; the explicit remember action
//! re-writes the override for confirmation feedback.

use sqlx::{Pool, Sqlite};
use tracing::debug;

use super::{get_pref, set_pref};
use crate::error::Result;
use crate::speed::{clamp_round, DEFAULT_SPEED};

const GLOBAL_KEY: &str = "currentSpeed";

/// Preference key of a per-site override.
pub fn site_key(hostname: &str) -> String {
    format!("domain_{hostname}")
}

/// Persist a speed change: global last-used value plus a per-site
/// override for the current hostname.
pub async fn save_speed(db: &Pool<Sqlite>, hostname: &str, speed: f64) -> Result<()> {
    let speed = clamp_round(speed);
    set_pref(db, GLOBAL_KEY, speed).await?;
    set_pref(db, &site_key(hostname), speed).await
}

/// Explicit "remember for this site" action.
pub async fn remember_site(db: &Pool<Sqlite>, hostname: &str, speed: f64) -> Result<()> {
    set_pref(db, &site_key(hostname), clamp_round(speed)).await
}

/// Resolve the speed to use on page load: per-site override, then the
/// global value, then 1.0.
///
/// Read and parse failures are treated as "no preference", never
/// surfaced to the caller.
pub async fn load_speed(db: &Pool<Sqlite>, hostname: &str) -> f64 {
    match get_pref::<f64>(db, &site_key(hostname)).await {
        Ok(Some(speed)) => return clamp_round(speed),
        Ok(None) => {}
        Err(e) => debug!("per-site preference unreadable for {hostname}: {e}"),
    }
    match get_pref::<f64>(db, GLOBAL_KEY).await {
        Ok(Some(speed)) => clamp_round(speed),
        Ok(None) => DEFAULT_SPEED,
        Err(e) => {
            debug!("global speed preference unreadable: {e}");
            DEFAULT_SPEED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect;

    #[tokio::test]
    async fn defaults_to_one_with_empty_store() {
        let db = connect(None).await.unwrap();
        assert_eq!(load_speed(&db, "example.com").await, 1.0);
    }

    #[tokio::test]
    async fn per_site_override_wins_over_global() {
        let db = connect(None).await.unwrap();
        set_pref(&db, GLOBAL_KEY, 1.5).await.unwrap();
        set_pref(&db, &site_key("example.com"), 2.0).await.unwrap();

        assert_eq!(load_speed(&db, "example.com").await, 2.0);
        assert_eq!(load_speed(&db, "other.com").await, 1.5);
    }

    #[tokio::test]
    async fn save_writes_global_and_site_rows() {
        let db = connect(None).await.unwrap();
        save_speed(&db, "videos.example", 1.8).await.unwrap();

        let global: Option<f64> = get_pref(&db, GLOBAL_KEY).await.unwrap();
        let site: Option<f64> = get_pref(&db, &site_key("videos.example")).await.unwrap();
        assert_eq!(global, Some(1.8));
        assert_eq!(site, Some(1.8));
    }

    #[tokio::test]
    async fn garbage_rows_read_as_no_preference() {
        let db = connect(None).await.unwrap();
        set_pref(&db, &site_key("example.com"), "banana").await.unwrap();
        set_pref(&db, GLOBAL_KEY, 1.25).await.unwrap();

        // Broken override falls through to the global value
        assert_eq!(load_speed(&db, "example.com").await, 1.25);

        set_pref(&db, GLOBAL_KEY, "also-banana").await.unwrap();
        assert_eq!(load_speed(&db, "example.com").await, 1.0);
    }

    #[tokio::test]
    async fn remember_rewrites_only_the_site_row() {
        let db = connect(None).await.unwrap();
        save_speed(&db, "example.com", 1.5).await.unwrap();
        remember_site(&db, "example.com", 2.5).await.unwrap();

        let global: Option<f64> = get_pref(&db, GLOBAL_KEY).await.unwrap();
        let site: Option<f64> = get_pref(&db, &site_key("example.com")).await.unwrap();
        assert_eq!(global, Some(1.5));
        assert_eq!(site, Some(2.5));
    }

    #[tokio::test]
    async fn loaded_values_are_canonicalized() {
        let db = connect(None).await.unwrap();
        set_pref(&db, &site_key("example.com"), 99.0).await.unwrap();
        assert_eq!(load_speed(&db, "example.com").await, 16.0);
    }
}
