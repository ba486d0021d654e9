use std::{error::Error, sync::Arc};

use zarrs_compat::{
    array::{open_dataset, ArrayBuilder, ArrayCreateError, DataType},
    group::{Group, GroupCreateError},
    metadata::{ContainerFormat, NodeType},
    node::{node_kind, NodeKind, NodePath},
    storage::store::FilesystemStore,
};

#[test]
#[cfg_attr(miri, ignore)]
fn hierarchy_per_format() -> Result<(), Box<dyn Error>> {
    let path = tempfile::TempDir::new()?;
    let store = Arc::new(FilesystemStore::new(path.path())?);

    for (name, format) in [
        ("v3", ContainerFormat::ZarrV3),
        ("v2", ContainerFormat::ZarrV2),
        ("n5", ContainerFormat::N5),
    ] {
        let attributes = serde_json::json!({"format": name})
            .as_object()
            .cloned()
            .unwrap_or_default();
        Group::new(store.clone(), &format!("/{name}"), format)?
            .with_attributes(attributes.clone())
            .store_metadata()?;
        ArrayBuilder::new(vec![4, 4], DataType::Int32, vec![2, 2])
            .format(format)
            .build(store.clone(), &format!("/{name}/array"))?
            .store_metadata()?;

        let group = Group::open(store.clone(), &format!("/{name}"))?;
        assert_eq!(group.format(), format);
        assert_eq!(group.attributes(), &attributes);

        assert_eq!(
            node_kind(&*store, &NodePath::new(&format!("/{name}/array"))?)?,
            Some(NodeKind {
                format,
                node_type: NodeType::Array,
            })
        );
        assert!(matches!(
            Group::open(store.clone(), &format!("/{name}/array")),
            Err(GroupCreateError::MissingMetadata(_))
        ));
        assert!(matches!(
            open_dataset(store.clone(), &format!("/{name}")),
            Err(ArrayCreateError::MissingMetadata(_))
        ));
    }

    assert!(path.path().join("v2/.zgroup").is_file());
    assert!(path.path().join("v2/.zattrs").is_file());
    assert!(path.path().join("v3/zarr.json").is_file());
    let root: serde_json::Value =
        serde_json::from_slice(&std::fs::read(path.path().join("attributes.json"))?)?;
    assert_eq!(root["n5"], "4.0.0");
    Ok(())
}
