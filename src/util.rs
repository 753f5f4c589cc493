pub use git_version::git_version;


#[macro_export]
macro_rules! my_git_version {
    () => {
        $crate::util::git_version!(
            args = ["--tags", "--always", "--dirty=-modified"],
            fallback = "unknown"
        )
    };
}
