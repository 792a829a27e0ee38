//! OAuth credential storage.
//!
//! The token file lives inside the project directory. Every path handed to
//! [`CredentialStore`] is resolved against that directory and rejected if it
//! ends up anywhere else, including through a symlink. Writes go to a
//! temporary file with owner-only permissions which is then renamed over the
//! target, so a crash never leaves a half-written token behind.

use std::fmt;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FileError, PathError};

/// Seconds subtracted from the reported lifetime so we refresh early.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// An OAuth access token and its metadata.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// The access token for API requests.
    #[serde(alias = "token")]
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// When the access token expires.
    #[serde(default, alias = "expiry")]
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// When the tokens were last refreshed.
    #[serde(default = "Utc::now")]
    pub last_refresh: DateTime<Utc>,
}

/// The result of exchanging a refresh token.
#[derive(Clone, PartialEq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_in_secs: Option<i64>,
    /// Set when the server rotated the refresh token.
    pub refresh_token: Option<String>,
}

impl Credential {
    /// Creates a credential from an OAuth token response.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(expiry_from_now),
            scopes,
            last_refresh: Utc::now(),
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        // Tokens without an expiry are assumed valid
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Returns true if every required scope was granted.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Applies a successful refresh in place.
    pub fn apply_refresh(&mut self, refreshed: RefreshedToken) {
        self.access_token = refreshed.access_token;
        self.expires_at = refreshed.expires_in_secs.map(expiry_from_now);
        if let Some(rotated) = refreshed.refresh_token {
            self.refresh_token = Some(rotated);
        }
        self.last_refresh = Utc::now();
    }
}

fn expiry_from_now(secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs) - Duration::seconds(EXPIRY_BUFFER_SECS)
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .field("last_refresh", &self.last_refresh)
            .finish()
    }
}

impl fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("access_token", &"<redacted>")
            .field("expires_in_secs", &self.expires_in_secs)
            .field("rotated", &self.refresh_token.is_some())
            .finish()
    }
}

/// File-backed credential storage confined to a project directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    root: PathBuf,
    token_path: PathBuf,
}

impl CredentialStore {
    /// Creates a store for `token_file`, resolved against `project_dir`.
    pub fn new(
        project_dir: impl AsRef<Path>,
        token_file: impl AsRef<Path>,
    ) -> Result<Self, PathError> {
        let project_dir = project_dir.as_ref();
        let root = fs::canonicalize(project_dir).map_err(|source| PathError::ProjectRoot {
            root: project_dir.to_path_buf(),
            source,
        })?;
        let token_path = resolve_within(&root, token_file.as_ref())?;
        Ok(Self { root, token_path })
    }

    /// The canonical project directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The resolved token file path.
    pub fn path(&self) -> &Path {
        &self.token_path
    }

    /// Resolves `path` and checks that it stays inside the project directory.
    ///
    /// Relative paths are taken relative to the project directory. `..`
    /// components are folded lexically, then the deepest existing ancestor
    /// is canonicalized so symlinks pointing elsewhere are caught.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, PathError> {
        resolve_within(&self.root, path.as_ref())
    }

    /// Reads a file that must live inside the project directory.
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<String, FileError> {
        let path = self.validate_path(path)?;
        fs::read_to_string(&path).map_err(|source| FileError::Read { path, source })
    }

    /// Loads the stored credential.
    ///
    /// Returns `Ok(None)` when there is no token file yet.
    pub fn load(&self) -> Result<Option<Credential>, FileError> {
        let path = self.validate_path(&self.token_path)?;

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no token file");
                return Ok(None);
            }
            Err(source) => return Err(FileError::Read { path, source }),
        };

        let credential: Credential =
            serde_json::from_str(&content).map_err(|e| FileError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        if credential.access_token.is_empty() {
            return Err(FileError::Corrupt {
                path,
                reason: "empty access token".to_string(),
            });
        }

        debug!(path = %path.display(), "loaded credential");
        Ok(Some(credential))
    }

    /// Persists `credential`, replacing any previous file atomically.
    pub fn save(&self, credential: &Credential) -> Result<(), FileError> {
        let path = self.validate_path(&self.token_path)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| FileError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(credential).map_err(|e| FileError::Corrupt {
            path: path.clone(),
            reason: format!("cannot serialize credential: {e}"),
        })?;

        let temp_path = temp_path_for(&path);
        write_private(&temp_path, content.as_bytes()).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            FileError::Write {
                path: temp_path.clone(),
                source,
            }
        })?;

        fs::rename(&temp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            FileError::Write {
                path: path.clone(),
                source,
            }
        })?;

        debug!(path = %path.display(), "saved credential");
        Ok(())
    }

    /// Removes the token file. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool, FileError> {
        let path = self.validate_path(&self.token_path)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "removed stored credential");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(FileError::Write { path, source }),
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "token".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Writes `data` to a fresh file readable only by its owner, then fsyncs it.
fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;

    // A leftover temp file keeps its old mode, so tighten it explicitly
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(data)?;
    file.sync_all()
}

fn resolve_within(root: &Path, path: &Path) -> Result<PathBuf, PathError> {
    let outside = || PathError::OutsideProject {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    };

    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    let normalized = normalize(&joined).ok_or_else(outside)?;
    if !normalized.starts_with(root) {
        return Err(outside());
    }

    let resolved = resolve_existing_prefix(&normalized);
    if !resolved.starts_with(root) {
        return Err(outside());
    }
    Ok(resolved)
}

/// Folds `.` and `..` without touching the filesystem.
///
/// Returns `None` if `..` climbs above the filesystem root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}

/// Canonicalizes the deepest existing ancestor and re-appends the rest.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = fs::canonicalize(existing) {
            let mut resolved = canonical;
            for part in rest.iter().rev() {
                resolved.push(part);
            }
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> CredentialStore {
        CredentialStore::new(dir.path(), "token.json").unwrap()
    }

    fn sample() -> Credential {
        Credential::new(
            "access-token",
            Some("refresh-token".to_string()),
            Some(3600),
            vec!["https://www.googleapis.com/auth/spreadsheets".to_string()],
        )
    }

    #[test]
    fn credential_expiry() {
        let mut credential = sample();
        assert!(!credential.is_expired());
        credential.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(credential.is_expired());
        credential.expires_at = None;
        assert!(!credential.is_expired());
    }

    #[test]
    fn credential_expiry_keeps_a_buffer() {
        let credential = Credential::new("a", None, Some(30), vec![]);
        assert!(credential.is_expired());
    }

    #[test]
    fn credential_scope_check() {
        let credential = Credential::new("a", None, None, vec!["s1".into(), "s2".into()]);
        assert!(credential.has_scopes(&["s1".to_string()]));
        assert!(credential.has_scopes(&["s1".to_string(), "s2".to_string()]));
        assert!(!credential.has_scopes(&["s3".to_string()]));
        assert!(credential.has_scopes(&[]));
    }

    #[test]
    fn apply_refresh_keeps_refresh_token_unless_rotated() {
        let mut credential = sample();
        credential.expires_at = Some(Utc::now() - Duration::hours(1));

        credential.apply_refresh(RefreshedToken {
            access_token: "fresh".to_string(),
            expires_in_secs: Some(3600),
            refresh_token: None,
        });
        assert_eq!(credential.access_token, "fresh");
        assert_eq!(credential.refresh_token.as_deref(), Some("refresh-token"));
        assert!(!credential.is_expired());

        credential.apply_refresh(RefreshedToken {
            access_token: "fresher".to_string(),
            expires_in_secs: None,
            refresh_token: Some("rotated".to_string()),
        });
        assert_eq!(credential.refresh_token.as_deref(), Some("rotated"));
    }

    #[test]
    fn debug_output_hides_tokens() {
        let debug = format!("{:?}", sample());
        assert!(!debug.contains("access-token"));
        assert!(!debug.contains("refresh-token"));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let credential = sample();

        store.save(&credential).unwrap();
        assert_eq!(store.load().unwrap(), Some(credential));
    }

    #[test]
    fn load_without_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(store(&dir).load().unwrap(), None);
    }

    #[test]
    fn load_corrupt_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("token.json"), "{not json").unwrap();
        assert!(matches!(
            store(&dir).load(),
            Err(FileError::Corrupt { .. })
        ));
    }

    #[test]
    fn load_empty_token_is_corrupt() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("token.json"), r#"{"access_token": ""}"#).unwrap();
        assert!(matches!(
            store(&dir).load(),
            Err(FileError::Corrupt { .. })
        ));
    }

    #[test]
    fn load_unreadable_path() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("token.json")).unwrap();
        assert!(matches!(store(&dir).load(), Err(FileError::Read { .. })));
    }

    #[test]
    fn load_token_with_google_library_field_names() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("token.json"),
            r#"{
                "token": "ya29.legacy",
                "refresh_token": "1//legacy",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_id": "id.apps.googleusercontent.com",
                "client_secret": "secret",
                "scopes": ["https://www.googleapis.com/auth/spreadsheets"],
                "expiry": "2024-05-01T12:00:00.123456Z"
            }"#,
        )
        .unwrap();

        let credential = store(&dir).load().unwrap().unwrap();
        assert_eq!(credential.access_token, "ya29.legacy");
        assert_eq!(credential.refresh_token.as_deref(), Some("1//legacy"));
        assert!(credential.is_expired());
        assert_eq!(credential.scopes.len(), 1);
    }

    #[test]
    fn save_replaces_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(&sample()).unwrap();

        let mut updated = sample();
        updated.access_token = "second".to_string();
        store.save(&updated).unwrap();

        assert_eq!(store.load().unwrap().unwrap().access_token, "second");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("token.json")]);
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(&sample()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn save_creates_nested_directories() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path(), "secrets/google/token.json").unwrap();
        store.save(&sample()).unwrap();
        assert!(dir.path().join("secrets/google/token.json").exists());
    }

    #[test]
    fn clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(!store.clear().unwrap());
        store.save(&sample()).unwrap();
        assert!(store.clear().unwrap());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn validate_path_accepts_paths_inside() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let root = store.root().to_path_buf();

        assert_eq!(
            store.validate_path("credentials.json").unwrap(),
            root.join("credentials.json")
        );
        assert_eq!(
            store.validate_path("a/./b/../token.json").unwrap(),
            root.join("a/token.json")
        );
        assert_eq!(
            store.validate_path(root.join("x.json")).unwrap(),
            root.join("x.json")
        );
    }

    #[test]
    fn validate_path_rejects_escapes() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        for bad in ["../token.json", "a/../../token.json", "/etc/passwd"] {
            assert!(
                matches!(
                    store.validate_path(bad),
                    Err(PathError::OutsideProject { .. })
                ),
                "{bad} was accepted"
            );
        }
    }

    #[test]
    fn constructor_rejects_token_outside_project() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            CredentialStore::new(dir.path(), "../token.json"),
            Err(PathError::OutsideProject { .. })
        ));
    }

    #[test]
    fn constructor_rejects_missing_project_dir() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            CredentialStore::new(dir.path().join("missing"), "token.json"),
            Err(PathError::ProjectRoot { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn validate_path_rejects_symlink_escape() {
        let project = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let target = elsewhere.path().join("stolen.json");
        fs::write(&target, "{}").unwrap();

        std::os::unix::fs::symlink(&target, project.path().join("link.json")).unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), project.path().join("dir")).unwrap();

        let store = store(&project);
        assert!(store.validate_path("link.json").is_err());
        assert!(store.validate_path("dir/new.json").is_err());
    }

    #[test]
    fn read_file_is_confined() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::write(dir.path().join("credentials.json"), "{}").unwrap();

        assert_eq!(store.read_file("credentials.json").unwrap(), "{}");
        assert!(matches!(
            store.read_file("../credentials.json"),
            Err(FileError::Path(_))
        ));
    }
}
