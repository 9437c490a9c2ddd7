use super::utils::{format_timestamp, render_empty_state};
use crate::Model;
use shared::{ActivityLogEntry, ActivityType, Order};
use yew::prelude::*;

pub fn render_activity_page(model: &Model) -> Html {
    let orders = model.store.orders();
    let log = model.store.activity_log();

    html! {
        <div class="activity-page">
            <h2>{"Orders"}</h2>
            if orders.is_empty() {
                { render_empty_state(model, "No batches uploaded in this session.") }
            } else {
                <table class="orders-table">
                    <thead>
                        <tr>
                            <th>{"Batch"}</th>
                            <th>{"Status"}</th>
                            <th>{"Images"}</th>
                            <th>{"Approved"}</th>
                            <th>{"Retouched"}</th>
                            <th>{"Created"}</th>
                        </tr>
                    </thead>
                    <tbody>
                        { for orders.iter().map(render_order_row) }
                    </tbody>
                </table>
            }
            <h2>{"Activity"}</h2>
            <ul class="activity-log">
                { for log.iter().map(render_entry) }
            </ul>
        </div>
    }
}

fn render_order_row(order: &Order) -> Html {
    html! {
        <tr key={order.id.clone()}>
            <td>{ &order.name }</td>
            <td>{ format!("{} ({}%)", order.status, order.progress) }</td>
            <td>{ format!("{} / {}", order.processed_count, order.total_images) }</td>
            <td>{ order.approved_count.to_string() }</td>
            <td>{ order.retouch_count.to_string() }</td>
            <td>{ format_timestamp(&order.created_at) }</td>
        </tr>
    }
}

fn icon(activity_type: ActivityType) -> &'static str {
    match activity_type {
        ActivityType::Upload => "fa-solid fa-upload",
        ActivityType::Process => "fa-solid fa-gears",
        ActivityType::Retouch => "fa-solid fa-paintbrush",
        ActivityType::Approve => "fa-solid fa-check",
        ActivityType::Delete => "fa-solid fa-trash",
        ActivityType::Export => "fa-solid fa-file-export",
    }
}

fn render_entry(entry: &ActivityLogEntry) -> Html {
    html! {
        <li class="activity-entry" key={entry.id.clone()}>
            <i class={icon(entry.activity_type)}></i>
            <div>
                <strong>{ &entry.action }</strong>
                <p>{ &entry.description }</p>
                <span class="activity-meta">
                    { format!("{} by {}", format_timestamp(&entry.timestamp), entry.user) }
                </span>
            </div>
        </li>
    }
}
