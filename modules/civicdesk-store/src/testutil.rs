//! Test utilities for spinning up a real MongoDB instance via testcontainers.

use testcontainers::{
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage,
};

use crate::StoreClient;

/// Spin up a MongoDB container and return the container handle + connected
/// StoreClient.
///
/// The container is dropped (and stopped) when `ContainerAsync` goes out of
/// scope, so callers must hold it alive for the duration of the test.
pub async fn mongo_container() -> (ContainerAsync<GenericImage>, StoreClient) {
    let image = GenericImage::new("mongo", "7")
        .with_exposed_port(ContainerPort::Tcp(27017))
        .with_wait_for(WaitFor::message_on_stdout("Waiting for connections"));

    let container: ContainerAsync<GenericImage> = image
        .start()
        .await
        .expect("Failed to start MongoDB container");

    let host_port = container
        .get_host_port_ipv4(27017)
        .await
        .expect("Failed to get MongoDB host port");

    let uri = format!("mongodb://127.0.0.1:{host_port}");
    let client = StoreClient::connect(&uri, "civicdesk_test")
        .await
        .expect("Failed to connect to MongoDB");

    (container, client)
}
