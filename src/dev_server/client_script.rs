use crate::settings::EVENTS_ROUTE;

const EVENTS_ROUTE_PLACEHOLDER: &str = "__EVENTS_ROUTE__";

// Logs every status and reloads once a build that was announced with `building` lands cleanly.
const CLIENT_SCRIPT_TEMPLATE: &str = r#"(() => {
  const source = new EventSource('__EVENTS_ROUTE__');
  let rebuilding = false;

  source.addEventListener('message', (event) => {
    let status;
    try {
      status = JSON.parse(event.data);
    } catch (_) {
      return;
    }

    switch (status.action) {
      case 'building':
        rebuilding = true;
        console.log('[buildsync] rebuilding...');
        break;
      case 'built':
      case 'sync':
        (status.warnings || []).forEach((warning) => console.warn('[buildsync]', warning));
        (status.errors || []).forEach((error) => console.error('[buildsync]', error));
        if (status.action === 'built' && rebuilding && !(status.errors || []).length) {
          window.location.reload();
        }
        rebuilding = false;
        break;
      default:
        console.log('[buildsync]', status);
    }
  });
})();
"#;

pub fn client_script() -> String {
    CLIENT_SCRIPT_TEMPLATE.replace(EVENTS_ROUTE_PLACEHOLDER, EVENTS_ROUTE)
}
