use std::fmt;
use std::path::PathBuf;

use courier_store::Job;

/// Everything needed for one authenticated file copy.
#[derive(Clone)]
pub struct DeliveryRequest {
    pub local_path: PathBuf,
    pub remote_directory: String,
    pub remote_filename: String,
    pub host: String,
    pub user: String,
    pub secret: String,
}

impl DeliveryRequest {
    /// Build a request from a stored job. Credentials are trimmed because
    /// they are routinely pasted with stray whitespace.
    pub fn from_job(job: &Job) -> Self {
        Self {
            local_path: PathBuf::from(&job.filepath),
            remote_directory: job.remote_directory.clone(),
            remote_filename: job.filename.clone(),
            host: job.remote_host.clone(),
            user: job.remote_user.clone(),
            secret: job.remote_secret.clone(),
        }
        .trimmed()
    }

    /// Copy with host, user, secret and directory stripped of surrounding
    /// whitespace.
    pub fn trimmed(&self) -> Self {
        Self {
            local_path: self.local_path.clone(),
            remote_directory: self.remote_directory.trim().to_string(),
            remote_filename: self.remote_filename.clone(),
            host: self.host.trim().to_string(),
            user: self.user.trim().to_string(),
            secret: self.secret.trim().to_string(),
        }
    }

    /// Full remote path of the file to write.
    ///
    /// An empty directory means the login directory.
    pub fn remote_path(&self) -> String {
        let dir = self.remote_directory.as_str();
        if dir.is_empty() {
            self.remote_filename.clone()
        } else if dir.ends_with('/') {
            format!("{dir}{}", self.remote_filename)
        } else {
            format!("{dir}/{}", self.remote_filename)
        }
    }

    /// Directory to check before writing.
    pub fn remote_dir_or_home(&self) -> &str {
        if self.remote_directory.is_empty() {
            "."
        } else {
            &self.remote_directory
        }
    }
}

impl fmt::Debug for DeliveryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryRequest")
            .field("local_path", &self.local_path)
            .field("remote_directory", &self.remote_directory)
            .field("remote_filename", &self.remote_filename)
            .field("host", &self.host)
            .field("user", &self.user)
            .field("secret_len", &self.secret.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_store::{JobStatus, ScheduledAt};

    fn request(dir: &str) -> DeliveryRequest {
        DeliveryRequest {
            local_path: PathBuf::from("/tmp/uploads/report.csv"),
            remote_directory: dir.to_string(),
            remote_filename: "report.csv".to_string(),
            host: "sftp.example.com".to_string(),
            user: "alice".to_string(),
            secret: "hunter2".to_string(),
        }
    }

    #[test]
    fn remote_path_joins_with_single_slash() {
        assert_eq!(request("/inbox").remote_path(), "/inbox/report.csv");
        assert_eq!(request("/inbox/").remote_path(), "/inbox/report.csv");
        assert_eq!(request("/").remote_path(), "/report.csv");
        assert_eq!(request("upload").remote_path(), "upload/report.csv");
    }

    #[test]
    fn empty_directory_means_login_directory() {
        let req = request("");
        assert_eq!(req.remote_path(), "report.csv");
        assert_eq!(req.remote_dir_or_home(), ".");
    }

    #[test]
    fn from_job_trims_pasted_credentials() {
        let job = Job {
            id: 1,
            filename: "report.csv".into(),
            filepath: "/tmp/uploads/report.csv".into(),
            remote_host: "  sftp.example.com\n".into(),
            remote_user: "\talice ".into(),
            remote_secret: " hunter2  ".into(),
            remote_directory: " /inbox ".into(),
            scheduled_at: ScheduledAt::parse("2024-01-01T09:00").unwrap(),
            status: JobStatus::Pending,
        };
        let req = DeliveryRequest::from_job(&job);
        assert_eq!(req.host, "sftp.example.com");
        assert_eq!(req.user, "alice");
        assert_eq!(req.secret, "hunter2");
        assert_eq!(req.remote_directory, "/inbox");
        assert_eq!(req.remote_path(), "/inbox/report.csv");
    }

    #[test]
    fn debug_hides_secret() {
        let rendered = format!("{:?}", request("/inbox"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("secret_len: 7"));
    }
}
