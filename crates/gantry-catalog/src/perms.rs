#![forbid(unsafe_code)]

use std::{fs, path::Path};

use crate::error::CatalogResult;

/// Set a staged or terminal directory to owner-only read+search
/// (`r-x------`), making its entries effectively immutable from this
/// uid without a prior chmod.
pub fn restrict_dir(dir: &Path) -> CatalogResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o500))?;
    }
    #[cfg(not(unix))]
    {
        let mut perms = fs::metadata(dir)?.permissions();
        perms.set_readonly(true);
        fs::set_permissions(dir, perms)?;
    }
    Ok(())
}

/// Give a restricted directory its write bit back, for the moment a
/// staged entry is renamed out of (or into) it.
pub fn unrestrict_dir(dir: &Path) -> CatalogResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    #[cfg(not(unix))]
    {
        let mut perms = fs::metadata(dir)?.permissions();
        perms.set_readonly(false);
        fs::set_permissions(dir, perms)?;
    }
    Ok(())
}

/// Set a staged file to owner-only read (`r--------`).
pub fn restrict_file(file: &Path) -> CatalogResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(file, fs::Permissions::from_mode(0o400))?;
    }
    #[cfg(not(unix))]
    {
        let mut perms = fs::metadata(file)?.permissions();
        perms.set_readonly(true);
        fs::set_permissions(file, perms)?;
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    #[test]
    fn restrict_modes() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("stage");
        let file = sub.join("img");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(&file, b"data").unwrap();

        restrict_file(&file).unwrap();
        restrict_dir(&sub).unwrap();

        let dir_mode = std::fs::metadata(&sub).unwrap().permissions().mode() & 0o777;
        let file_mode = std::fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o500);
        assert_eq!(file_mode, 0o400);

        // Restore write access so the tempdir can clean up after itself.
        std::fs::set_permissions(&sub, std::fs::Permissions::from_mode(0o700)).unwrap();
    }
}
