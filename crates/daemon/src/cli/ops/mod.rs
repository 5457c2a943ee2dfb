pub mod cat;
pub mod init;
pub mod ls;
pub mod mkdir;
pub mod put;
pub mod rm;
pub mod stats;
pub mod version;

pub use cat::Cat;
pub use init::Init;
pub use ls::Ls;
pub use mkdir::Mkdir;
pub use put::Put;
pub use rm::Rm;
pub use stats::Stats;
pub use version::Version;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::op::{Op, OpContext};

    fn initialized() -> (OpContext, tempfile::TempDir) {
        let temp = tempfile::tempdir().unwrap();
        let ctx = OpContext::new(Some(temp.path().join("tierfs")));
        Init {
            data_partition: None,
            cache_size: None,
            buffer_size: None,
            temp_ttl_ms: Some(0),
            no_temp: false,
            no_memory: false,
            mirror: init::MirrorType::None,
            s3_url: None,
            mirror_path: None,
            mirror_prefix: String::new(),
        }
        .execute(&ctx)
        .unwrap();
        (ctx, temp)
    }

    #[test]
    fn test_put_cat_ls_rm() {
        let (ctx, temp) = initialized();
        let source = temp.path().join("upload.txt");
        std::fs::write(&source, "hello tierfs").unwrap();

        let put = Put {
            path: "docs/hello.txt".to_string(),
            source,
        }
        .execute(&ctx)
        .unwrap();
        assert_eq!(put.size, 12);
        assert_eq!(put.tier, common::StorageTier::Persistent);

        let output = Cat {
            path: "docs/hello.txt".to_string(),
        }
        .execute(&ctx)
        .unwrap();
        assert!(matches!(
            output.content,
            cat::CatContent::Text(ref text) if text == "hello tierfs"
        ));

        Mkdir {
            path: "empty/dir".to_string(),
        }
        .execute(&ctx)
        .unwrap();

        let listing = Ls {
            prefix: String::new(),
            dirs: true,
            json: false,
        }
        .execute(&ctx)
        .unwrap();
        match listing.items {
            ls::LsItems::Detailed(items) => {
                let paths: Vec<&str> = items.iter().map(|item| item.path.as_str()).collect();
                assert_eq!(paths, vec!["docs", "docs/hello.txt", "empty", "empty/dir"]);
            }
            other => panic!("unexpected listing {other:?}"),
        }

        let stats = Stats { json: true }.execute(&ctx).unwrap();
        assert_eq!(stats.stats.file_count, 1);
        assert_eq!(stats.stats.used_bytes, 12);

        Rm {
            path: "docs/hello.txt".to_string(),
        }
        .execute(&ctx)
        .unwrap();
        let err = Cat {
            path: "docs/hello.txt".to_string(),
        }
        .execute(&ctx)
        .unwrap_err();
        assert!(matches!(err, cat::CatError::Disk(ref e) if e.is_not_found()));
    }

    #[test]
    fn test_requires_init() {
        let temp = tempfile::tempdir().unwrap();
        let ctx = OpContext::new(Some(temp.path().to_path_buf()));

        let err = Stats { json: false }.execute(&ctx).unwrap_err();
        assert!(matches!(
            err,
            stats::StatsError::State(tierfs_daemon::StateError::NotInitialized(_))
        ));
    }
}
