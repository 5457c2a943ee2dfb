use std::convert::Infallible;

use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct Version;

impl crate::cli::op::Op for Version {
    type Error = Infallible;
    type Output = String;

    fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        Ok(tierfs_daemon::build_info())
    }
}
