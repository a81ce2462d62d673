//! Argument lists for DevTools CLI side operations (build/deploy/list).
//!
//! Each builder produces the explicit, ordered token list: verb tokens first,
//! then flag/value pairs.

use std::path::Path;

pub fn build_npm_args(project: &Path) -> Vec<String> {
    vec![
        "build-npm".to_string(),
        "--project".to_string(),
        project.display().to_string(),
    ]
}

pub fn deploy_functions_args(
    env: &str,
    names: &[String],
    remote_install: bool,
    project: &Path,
) -> Vec<String> {
    let mut args = vec![
        "cloud".to_string(),
        "functions".to_string(),
        "deploy".to_string(),
        "--env".to_string(),
        env.to_string(),
        "--names".to_string(),
        names.join(","),
        "--project".to_string(),
        project.display().to_string(),
    ];
    if remote_install {
        args.push("--remote-npm-install".to_string());
    }
    args
}

pub fn list_functions_args(env: &str, project: &Path) -> Vec<String> {
    vec![
        "cloud".to_string(),
        "functions".to_string(),
        "list".to_string(),
        "--env".to_string(),
        env.to_string(),
        "--project".to_string(),
        project.display().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_npm_args() {
        assert_eq!(
            build_npm_args(Path::new("/proj")),
            vec!["build-npm", "--project", "/proj"]
        );
    }

    #[test]
    fn test_deploy_functions_args_ordered() {
        let names = vec!["login".to_string(), "sync".to_string()];
        assert_eq!(
            deploy_functions_args("prod-1", &names, true, Path::new("/proj")),
            vec![
                "cloud",
                "functions",
                "deploy",
                "--env",
                "prod-1",
                "--names",
                "login,sync",
                "--project",
                "/proj",
                "--remote-npm-install",
            ]
        );
    }

    #[test]
    fn test_deploy_functions_args_without_remote_install() {
        let names = vec!["login".to_string()];
        let args = deploy_functions_args("dev", &names, false, Path::new("/proj"));
        assert!(!args.contains(&"--remote-npm-install".to_string()));
    }

    #[test]
    fn test_list_functions_args() {
        assert_eq!(
            list_functions_args("dev", Path::new("/proj")),
            vec!["cloud", "functions", "list", "--env", "dev", "--project", "/proj"]
        );
    }
}
