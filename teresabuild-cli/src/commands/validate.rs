//! `teresabuild validate` - check the five required fields without running

use anyhow::Result;

use super::StepArgs;

pub fn run_validate(args: StepArgs) -> Result<()> {
    let resolved = args.resolve()?;

    match resolved.config.validate() {
        Ok(()) => {
            println!("✅ Configuration valid");
            println!("   Cluster: {} ({})", resolved.config.cluster_name(), resolved.config.server());
            println!("   Login: {}", resolved.config.login());
            println!("   CLI: {}", resolved.cli);
            Ok(())
        }
        Err(err) => {
            eprintln!("❌ Configuration invalid:");
            for field in &err.fields {
                eprintln!("   {}", field);
            }
            std::process::exit(1);
        }
    }
}
