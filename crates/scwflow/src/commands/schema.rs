use scwflow_cloud::Provider;

pub fn handle(type_name: Option<&str>) -> anyhow::Result<()> {
    let schema = Provider::new(scwflow_cloud_scaleway::builder())?.schema();

    let value = match type_name {
        None => serde_json::to_value(&schema)?,
        Some(name) => {
            let found = schema
                .resources
                .get(name)
                .or_else(|| schema.data_sources.get(name))
                .ok_or_else(|| anyhow::anyhow!("unknown type '{}'", name))?;
            serde_json::to_value(found)?
        }
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
