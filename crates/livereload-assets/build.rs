fn main() {
    // Only fetch the client script when it gets compiled into the binary
    #[cfg(feature = "embed")]
    {
        use std::path::Path;
        use std::process::Command;

        fn run_npm(args: &[&str], cwd: &Path) -> std::io::Result<std::process::Output> {
            #[cfg(target_os = "windows")]
            {
                Command::new("cmd")
                    .args(["/C", "npm"])
                    .args(args)
                    .current_dir(cwd)
                    .output()
            }
            #[cfg(not(target_os = "windows"))]
            {
                Command::new("npm").args(args).current_dir(cwd).output()
            }
        }

        let workspace_dir = Path::new("../..");

        if !workspace_dir
            .join("node_modules/livereload-js/dist/livereload.js")
            .exists()
        {
            let install =
                run_npm(&["install"], workspace_dir).expect("failed to run npm install");
            assert!(
                install.status.success(),
                "failed to install livereload-js:\n{}",
                std::str::from_utf8(&install.stderr).unwrap()
            );
        }

        println!("cargo:rerun-if-changed=../../package.json");
        println!("cargo:rerun-if-changed=build.rs");
    }
}
