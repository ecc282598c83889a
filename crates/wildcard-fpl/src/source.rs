// Candidate providers: where the optimizer's input pool comes from.
//
// `FplCandidateSource` pulls live data from the FPL API (fixtures too when
// the scoring model reads them), filters and scores it. `CsvCandidateSource` reads a pre-scored pool from disk.

use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use wildcard_core::{Candidate, Position};

use crate::bootstrap::PlayerRecord;
use crate::client::{ClientError, FplClient};
use crate::filter::PoolFilter;
use crate::fixtures::{FixtureOutlook, LOOKAHEAD_GAMEWEEKS};
use crate::scoring::ScoringModel;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("no usable candidates: {0}")]
    Empty(String),
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Fetch the current candidate pool.
#[async_trait]
pub trait CandidateProvider: Send + Sync {
    async fn fetch_candidates(&self) -> Result<Vec<Candidate>, ProviderError>;
}

// ---------------------------------------------------------------------------
// FPL API source
// ---------------------------------------------------------------------------

pub struct FplCandidateSource {
    client: FplClient,
    filter: PoolFilter,
    scoring: Box<dyn ScoringModel>,
}

impl FplCandidateSource {
    pub fn new(client: FplClient, filter: PoolFilter, scoring: Box<dyn ScoringModel>) -> Self {
        Self {
            client,
            filter,
            scoring,
        }
    }
}

/// Filter `players`, score the survivors and convert them to candidates.
pub fn build_candidates(
    players: Vec<PlayerRecord>,
    filter: &PoolFilter,
    scoring: &dyn ScoringModel,
) -> Vec<Candidate> {
    let total = players.len();
    let kept = filter.apply(players);
    info!("Pool filter kept {} of {} players", kept.len(), total);

    let scores = scoring.score(&kept);
    kept.into_iter()
        .zip(scores)
        .map(|(p, score)| Candidate {
            id: p.id,
            name: p.name,
            position: p.position,
            club: p.club,
            price: p.price,
            score,
            ownership_pct: p.ownership_pct,
        })
        .collect()
}

#[async_trait]
impl CandidateProvider for FplCandidateSource {
    async fn fetch_candidates(&self) -> Result<Vec<Candidate>, ProviderError> {
        let bootstrap = self.client.bootstrap_static().await?;
        let mut players = bootstrap.players();
        if self.scoring.needs_fixtures() {
            let fixtures = self.client.fixtures().await?;
            FixtureOutlook::from_fixtures(&fixtures, LOOKAHEAD_GAMEWEEKS).apply(&mut players);
        }
        let candidates = build_candidates(players, &self.filter, self.scoring.as_ref());
        if candidates.is_empty() {
            return Err(ProviderError::Empty(format!(
                "no players from {} passed the pool filter",
                self.client.base_url()
            )));
        }
        Ok(candidates)
    }
}

// ---------------------------------------------------------------------------
// CSV source
// ---------------------------------------------------------------------------

/// Columns: `id,name,position,club,price,score,ownership_pct`. Extra
/// columns are ignored.
#[derive(Debug, Deserialize)]
struct RawCandidateRow {
    id: u32,
    name: String,
    position: String,
    club: String,
    price: f64,
    score: f64,
    #[serde(default)]
    ownership_pct: f64,
}

fn load_candidates_from_reader<R: Read>(rdr: R) -> Result<Vec<Candidate>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut candidates = Vec::new();
    for result in reader.deserialize::<RawCandidateRow>() {
        match result {
            Ok(raw) => {
                let name = raw.name.trim().to_string();
                let Some(position) = Position::from_str_pos(&raw.position) else {
                    warn!("skipping candidate '{}': unknown position '{}'", name, raw.position);
                    continue;
                };
                if !raw.price.is_finite() || raw.price < 0.0 {
                    warn!("skipping candidate '{}': invalid price {}", name, raw.price);
                    continue;
                }
                if !raw.score.is_finite() {
                    warn!("skipping candidate '{}': non-finite score", name);
                    continue;
                }
                if candidates.iter().any(|c: &Candidate| c.id == raw.id) {
                    warn!("skipping candidate '{}': duplicate id {}", name, raw.id);
                    continue;
                }
                candidates.push(Candidate {
                    id: raw.id,
                    name,
                    position,
                    club: raw.club.trim().to_string(),
                    price: raw.price,
                    score: raw.score,
                    ownership_pct: if raw.ownership_pct.is_finite() {
                        raw.ownership_pct
                    } else {
                        0.0
                    },
                });
            }
            Err(e) => {
                warn!("skipping malformed candidate row: {}", e);
            }
        }
    }
    Ok(candidates)
}

/// Load a pre-scored candidate pool from a CSV file.
pub fn load_candidates(path: &Path) -> Result<Vec<Candidate>, ProviderError> {
    let file = std::fs::File::open(path).map_err(|e| ProviderError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_candidates_from_reader(file).map_err(|e| ProviderError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

pub struct CsvCandidateSource {
    path: PathBuf,
}

impl CsvCandidateSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CandidateProvider for CsvCandidateSource {
    async fn fetch_candidates(&self) -> Result<Vec<Candidate>, ProviderError> {
        let candidates = load_candidates(&self.path)?;
        if candidates.is_empty() {
            return Err(ProviderError::Empty(format!(
                "{} produced zero valid rows",
                self.path.display()
            )));
        }
        info!(
            "Loaded {} candidates from {}",
            candidates.len(),
            self.path.display()
        );
        Ok(candidates)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{Metric, WeightedMetricScoring};
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const HEADER: &str = "id,name,position,club,price,score,ownership_pct\n";

    #[test]
    fn csv_rows_parsed() {
        let data = format!("{HEADER}1, Raya ,GKP,ARS,5.5,61.2,32.1\n2,Saka,mid,ARS,10.0,88.0,41.0\n");
        let candidates = load_candidates_from_reader(data.as_bytes()).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name, "Raya");
        assert_eq!(candidates[0].position, Position::Goalkeeper);
        assert_eq!(candidates[1].position, Position::Midfielder);
        assert!((candidates[1].ownership_pct - 41.0).abs() < 1e-9);
    }

    #[test]
    fn csv_extra_columns_ignored() {
        let data = "id,name,position,club,price,score,ownership_pct,notes\n\
                    1,Raya,GK,ARS,5.5,61.2,32.1,keeper\n";
        let candidates = load_candidates_from_reader(data.as_bytes()).unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn csv_missing_ownership_defaults_to_zero() {
        let data = "id,name,position,club,price,score\n1,Raya,GK,ARS,5.5,61.2\n";
        let candidates = load_candidates_from_reader(data.as_bytes()).unwrap();
        assert_eq!(candidates[0].ownership_pct, 0.0);
    }

    #[test]
    fn malformed_rows_skipped() {
        let data = format!(
            "{HEADER}1,Raya,GK,ARS,5.5,61.2,32.1\n\
             2,Bad,GK,ARS,not-a-price,1.0,1.0\n\
             3,Striker,ST,ARS,7.0,1.0,1.0\n\
             4,Neg,DEF,ARS,-1.0,1.0,1.0\n\
             1,Dup,DEF,ARS,4.0,1.0,1.0\n"
        );
        let candidates = load_candidates_from_reader(data.as_bytes()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, 1);
        assert_eq!(candidates[0].name, "Raya");
    }

    #[test]
    fn empty_csv_returns_empty_vec() {
        let candidates = load_candidates_from_reader(HEADER.as_bytes()).unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn csv_source_rejects_empty_file() {
        let dir = std::env::temp_dir().join("wildcard_test_csv_empty");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pool.csv");
        std::fs::write(&path, HEADER).unwrap();

        let err = CsvCandidateSource::new(&path)
            .fetch_candidates()
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Empty(_)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn csv_source_missing_file_is_io_error() {
        let err = CsvCandidateSource::new("/nonexistent/wildcard/pool.csv")
            .fetch_candidates()
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Io { .. }));
    }

    #[test]
    fn build_candidates_filters_and_scores() {
        let base = PlayerRecord {
            id: 1,
            name: "A".into(),
            position: Position::Defender,
            club: "ARS".into(),
            team_id: 1,
            price: 5.0,
            status: "a".into(),
            chance_of_playing: None,
            ownership_pct: 12.0,
            total_points: 20.0,
            minutes: 270.0,
            form: 0.0,
            ep_next: 0.0,
            goals: 0.0,
            assists: 0.0,
            clean_sheets: 0.0,
            saves: 0.0,
            creativity: 0.0,
            threat: 0.0,
            expected_goals: 0.0,
            expected_assists: 0.0,
            fixture_difficulty: 3.0,
        };
        let injured = PlayerRecord {
            id: 2,
            status: "u".into(),
            ..base.clone()
        };
        let weaker = PlayerRecord {
            id: 3,
            total_points: 10.0,
            ..base.clone()
        };

        let candidates = build_candidates(
            vec![base, injured, weaker],
            &PoolFilter::default(),
            &WeightedMetricScoring::default(),
        );
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, 1);
        assert!((candidates[0].ownership_pct - 12.0).abs() < 1e-9);
        assert!(candidates[0].score > candidates[1].score);
    }

    const BOOTSTRAP: &str = r#"{"elements": [
        {"id": 1, "web_name": "Easy", "element_type": 3, "team": 1, "now_cost": 80,
         "minutes": 900, "ep_next": "5.0", "selected_by_percent": "10.0"},
        {"id": 2, "web_name": "Hard", "element_type": 3, "team": 2, "now_cost": 80,
         "minutes": 900, "ep_next": "5.0", "selected_by_percent": "10.0"}],
        "teams": [{"id": 1, "name": "One", "short_name": "ONE"},
                  {"id": 2, "name": "Two", "short_name": "TWO"}],
        "element_types": [{"id": 3, "singular_name_short": "MID"}]}"#;

    const FIXTURES: &str = r#"[
        {"event": 9, "team_h": 1, "team_a": 3, "team_h_difficulty": 2, "team_a_difficulty": 4, "finished": false},
        {"event": 9, "team_h": 4, "team_a": 2, "team_h_difficulty": 2, "team_a_difficulty": 4, "finished": false}]"#;

    /// Serve the bootstrap and fixtures payloads by path until the test ends,
    /// recording each request line.
    async fn serve_api() -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let line = request.lines().next().unwrap_or_default().to_string();
                let body = if line.starts_with("GET /api/fixtures/ ") {
                    FIXTURES
                } else {
                    BOOTSTRAP
                };
                log.lock().unwrap().push(line);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}/api"), seen)
    }

    #[tokio::test]
    async fn fixture_weighted_scoring_fetches_fixtures() {
        let (base, seen) = serve_api().await;
        let scoring = WeightedMetricScoring::new(BTreeMap::from([(
            Position::Midfielder,
            vec![(Metric::FixtureAdjustedEp, 1.0)],
        )]));
        let source = FplCandidateSource::new(
            FplClient::new(&base, Duration::from_secs(5)).unwrap(),
            PoolFilter::default(),
            Box::new(scoring),
        );

        let candidates = source.fetch_candidates().await.unwrap();
        assert_eq!(candidates.len(), 2);
        // Team 1 is at home to a weak side (1.7), team 2 away to a strong one (4.3).
        assert!((candidates[0].score - 100.0).abs() < 1e-9);
        assert!((candidates[1].score - 0.85 / 1.15 * 100.0).abs() < 1e-9);

        let seen = seen.lock().unwrap();
        assert!(seen.iter().any(|l| l.starts_with("GET /api/fixtures/ ")));
    }

    #[tokio::test]
    async fn default_scoring_skips_fixtures() {
        let (base, seen) = serve_api().await;
        let source = FplCandidateSource::new(
            FplClient::new(&base, Duration::from_secs(5)).unwrap(),
            PoolFilter::default(),
            Box::new(WeightedMetricScoring::default()),
        );

        let candidates = source.fetch_candidates().await.unwrap();
        assert_eq!(candidates.len(), 2);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with("GET /api/bootstrap-static/ "));
    }
}
