use std::path::{Path, PathBuf};

/// Name of the systemd mount unit for the shared data directory.
pub const MOUNT_UNIT_NAME: &str = "media-nextcloud-data.mount";

/// Filesystem locations the controller reads and writes.
///
/// `Layout::system()` is the production layout. `Layout::rooted` moves every
/// path under a prefix so tests can run against a temporary directory.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Directory the payload tarball is extracted into.
    pub install_parent: PathBuf,
    pub nextcloud_root: PathBuf,
    pub config_php: PathBuf,
    pub ceph_config_php: PathBuf,
    pub redis_config_php: PathBuf,
    pub default_datadir: PathBuf,
    pub apache_site: PathBuf,
    /// Root of the PHP configuration tree (`/etc/php`).
    pub php_root: PathBuf,
    pub mount_unit: PathBuf,
    pub mount_datadir: PathBuf,
    pub credential_file: PathBuf,
    pub database_credential: PathBuf,
    pub backup_script: PathBuf,
    pub backup_conf: PathBuf,
    pub backup_cron: PathBuf,
    pub state_file: PathBuf,
    /// Local replica of the peer relation kept by the host binary.
    pub peer_file: PathBuf,
}

impl Layout {
    pub fn system() -> Self {
        Self::rooted("/")
    }

    pub fn rooted<P: AsRef<Path>>(prefix: P) -> Self {
        let root = prefix.as_ref();
        let at = |path: &str| root.join(path.trim_start_matches('/'));

        Self {
            install_parent: at("/var/www"),
            nextcloud_root: at("/var/www/nextcloud"),
            config_php: at("/var/www/nextcloud/config/config.php"),
            ceph_config_php: at("/var/www/nextcloud/config/ceph.config.php"),
            redis_config_php: at("/var/www/nextcloud/config/redis.config.php"),
            default_datadir: at("/var/www/nextcloud/data"),
            apache_site: at("/etc/apache2/sites-available/nextcloud.conf"),
            php_root: at("/etc/php"),
            mount_unit: at(&format!("/etc/systemd/system/{}", MOUNT_UNIT_NAME)),
            mount_datadir: at("/media/nextcloud/data"),
            credential_file: at("/root/.onetimelogin"),
            database_credential: at("/root/.nextcloud-db"),
            backup_script: at("/root/scripts/backup/run_backup.sh"),
            backup_conf: at(
                "/root/scripts/backup/Nextcloud-Backup-Restore/NextcloudBackupRestore.conf",
            ),
            backup_cron: at("/etc/cron.d/nextcloud-backup"),
            state_file: at("/var/lib/ncunit/state.json"),
            peer_file: at("/var/lib/ncunit/peers.json"),
        }
    }

    /// Path of a PHP module ini for the given PHP version, e.g.
    /// `/etc/php/8.1/mods-available/nextcloud.ini`.
    pub fn php_module(&self, php_version: &str, module: &str) -> PathBuf {
        self.php_root
            .join(php_version)
            .join("mods-available")
            .join(format!("{}.ini", module))
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::system()
    }
}
