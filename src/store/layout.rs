//! File names making up a document's artifact bundle

/// Sub-directory of the document root holding the bundle
pub const ARTIFACT_SUBDIR: &str = "reproducibility";

/// Copy of the document source that produced the local render
pub const SOURCE_FILE: &str = "notebook.Rmd";

/// HTML produced by the rendering engine on the host
pub const LOCAL_RENDER_FILE: &str = "notebook_local.html";

/// HTML produced by the tracer inside its isolated environment
pub const CONTAINER_RENDER_FILE: &str = "notebook_container.html";

/// Comparison of the two renders
pub const SEMANTIC_DIFF_FILE: &str = "semantic_diff.html";

pub const DOCKERFILE: &str = "Dockerfile";
pub const MAKEFILE: &str = "Makefile";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Tar archive of every file the traced run touched
pub const ACCESS_ARCHIVE_FILE: &str = "archive.tar";

/// Package installation script generated by the tracer
pub const INSTALL_SCRIPT_FILE: &str = "install_r_packages.R";

/// Digest of the content that last produced a complete build
pub const CONTENT_HASH_FILE: &str = ".content_hash";

/// Cross-process build lock, in the document root outside the bundle
pub const BUILD_LOCK_FILE: &str = ".build.lock";

/// Downloadable package, stored next to the artifact directory
pub const PACKAGE_ZIP_FILE: &str = "reproducibility_package.zip";

/// Output name the rendering engine is asked to produce
pub const RENDER_OUTPUT_FILE: &str = "notebook.html";
