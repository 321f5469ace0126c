use std::process::Command;

fn main() {
    // 获取 git 版本信息
    let git_hash = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|hash| hash.trim().to_string())
        .filter(|hash| !hash.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    // 将版本信息传递给编译器
    println!("cargo:rustc-env=GIT_HASH={}", git_hash);

    // 训练框架通过 python 调用
    let python_check = Command::new("python")
        .arg("--version")
        .output();

    if python_check.is_err() {
        println!("cargo:warning=python not found in PATH, the training command may not work");
    }
}
